use std::{env, sync::Arc, thread, time::Duration};

use keyboard_cleaner::{
    blocker::Config,
    permission::request_permission,
    platform::SystemPermission,
};

fn main() {
    #[cfg(feature = "log")]
    colog::init();

    let seconds = env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(30);

    if !request_permission(Arc::new(SystemPermission::default()))
        .recv()
        .unwrap_or(false)
    {
        println!("Allow this program to monitor the keyboard, then run it again.");
        return;
    }

    let mut blocker = match keyboard_cleaner::start(Config::default()) {
        Ok(blocker) => blocker,
        Err(e) => {
            eprintln!("could not block the keyboard: {e}");
            return;
        }
    };
    let states = blocker.subscribe();

    println!("Keyboard blocked for {seconds} seconds. Pointer input and Cmd+Q still work.");
    thread::sleep(Duration::from_secs(seconds));

    blocker.disable();
    for state in states.try_iter() {
        println!("{state}");
    }
}
