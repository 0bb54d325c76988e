/// A Waverless ASCII art banner for the menu screen.
pub const MENU_BANNER: [&str; 8] = [
    "                                                                    ",
    " __      __                        .__                              ",
    "/  \\    /  \\_____ ___  __ ____ _______|  |   ____   ______ ______   ",
    "\\   \\/\\/   /\\__  \\\\  \\/ // __ \\\\_  __ \\  | _/ __ \\ /  ___//  ___/   ",
    " \\        /  / __ \\\\   /\\  ___/ |  | \\/  |_\\  ___/ \\___ \\ \\___ \\    ",
    "  \\__/\\  /  (____  /\\_/  \\___  >|__|  |____/\\___  >____  >____  >   ",
    "       \\/        \\/          \\/                 \\/     \\/     \\/    ",
    crate::constants::VERSION,
];

/// Shown above the logs of a worker.
pub const LOG_TAIL_HINT: &str = "Showing the most recent lines, press r to refresh";

/// Default task payload offered on the overview tab.
pub const DEFAULT_TASK_INPUT: &str = r#"{"prompt": "hello"}"#;

/// Version from `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
