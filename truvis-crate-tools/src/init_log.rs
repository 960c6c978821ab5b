use std::io::Write;

use env_logger::fmt::Formatter;

/// 以 Info 级别初始化全局日志
///
/// `RUST_LOG` 环境变量存在时会覆盖这里的默认级别。
pub fn init_log() {
    init_log_with(log::LevelFilter::Info);
}

/// 以指定级别初始化全局日志
///
/// 重复初始化时只会打印一条 warning，不会 panic。
pub fn init_log_with(level: log::LevelFilter) {
    let result = env_logger::Builder::new()
        .format(format_record)
        .filter_level(level)
        .parse_default_env()
        .try_init();

    if let Err(e) = result {
        log::warn!("logger already initialized: {e}");
    }
}

/// 单元测试使用的日志初始化
///
/// 输出交给 libtest 捕获，可以在每个测试开头重复调用。
pub fn init_test_log() {
    let _ = env_logger::Builder::new()
        .format(format_record)
        .filter_level(log::LevelFilter::Trace)
        .is_test(true)
        .try_init();
}

fn format_record(buf: &mut Formatter, record: &log::Record<'_>) -> std::io::Result<()> {
    let info_style = buf
        .default_level_style(log::Level::Info)
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green)));
    let warn_style = buf
        .default_level_style(log::Level::Warn)
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow)));
    let error_style = buf
        .default_level_style(log::Level::Error)
        .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Red)));

    let level_style = match record.level() {
        log::Level::Info => info_style,
        log::Level::Warn => warn_style,
        log::Level::Error => error_style,
        _ => buf.default_level_style(record.level()),
    };
    let grey_style = info_style.fg_color(Some(anstyle::Color::Rgb(anstyle::RgbColor(110, 110, 110))));

    let line = record.line().unwrap_or(!0);
    // windows 和 unix 的路径分隔符都要处理
    let file = record.file().unwrap_or("").rsplit(['\\', '/']).next().unwrap_or("");
    let time = chrono::Local::now().format("%H:%M:%S%.3f");
    let level = record.level();

    writeln!(
        buf,
        "{level_style}[{time}] {level:<5}{level_style:#} {grey_style}[{file}:{line}]{grey_style:#} {}",
        record.args()
    )
}
