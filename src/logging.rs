use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Routes the `log` macros to stderr so diagnostics never mix with the
/// output of a pipeline's last stage.
pub fn init(level: LevelFilter) {
    if level == LevelFilter::Off {
        return;
    }
    let config = ConfigBuilder::new()
        .set_time_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .build();
    // a logger installed earlier in this process wins
    let _ = TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto);
}
