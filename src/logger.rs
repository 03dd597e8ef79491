use env_logger::{Builder, Env, Target};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// 同时写到标准输出和日志文件
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stdout().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stdout().flush()?;
        self.file.flush()
    }
}

/// 初始化日志，格式: `2024-05-16 13:00:00 - INFO - message`
///
/// `RUST_LOG` 未设置时默认 info 级别。
pub fn init(log_file: Option<&Path>) -> io::Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            record.level(),
            record.args()
        )
    });

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder.target(Target::Pipe(Box::new(Tee { file })));
        }
        None => {
            builder.target(Target::Stdout);
        }
    }

    builder.try_init().map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
