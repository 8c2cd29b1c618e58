use std::io::Write;

use ext2_forensics::{Ext2Driver, FilesystemDriver, FilesystemGeometry};

fn main() {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let (disk_file, command) = match &args[..] {
        [_, disk_file] => (disk_file, Command::Info),
        [_, disk_file, cmd] if cmd == "info" => (disk_file, Command::Info),
        [_, disk_file, cmd, path] if cmd == "ls" => (disk_file, Command::List(path)),
        [_, disk_file, cmd, path] if cmd == "cat" => (disk_file, Command::Cat(path)),
        _ => {
            eprintln!("Usage: {} <disk_image> [info | ls <path> | cat <path>]", args[0]);
            std::process::exit(1);
        }
    };

    let image = match std::fs::read(disk_file) {
        Ok(image) => image,
        Err(err) => {
            eprintln!("failed to read {disk_file}: {err}");
            std::process::exit(1);
        }
    };
    log::info!("read {} bytes from {disk_file}", image.len());

    let driver = match Ext2Driver::open(image) {
        Ok(driver) => driver,
        Err(err) => {
            eprintln!("{disk_file}: {err}");
            std::process::exit(1);
        }
    };

    let result: Result<(), Box<dyn std::error::Error>> = match command {
        Command::Info => {
            if let Some(geometry) = driver.geometry() {
                print_geometry(geometry);
            }
            Ok(())
        }
        Command::List(path) => driver
            .list_directory(path)
            .map(|entries| {
                for entry in entries {
                    let kind = if entry.is_dir { 'd' } else { '-' };
                    println!(
                        "{kind} {:>8} {:>3} {:>12} {:>12} {:>12} {:>10} {}",
                        entry.inode.0,
                        entry.links,
                        entry.size,
                        entry.created,
                        entry.accessed,
                        entry.modified,
                        entry.name
                    );
                }
            })
            .map_err(Into::into),
        Command::Cat(path) => driver.read_file(path).map_err(Into::into).and_then(|data| {
            write_content(&mut std::io::stdout().lock(), &data).map_err(Into::into)
        }),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

/// Writes file content out in full. A short or failed write is an error.
fn write_content<W: Write>(out: &mut W, data: &[u8]) -> std::io::Result<()> {
    out.write_all(data)?;
    out.flush()
}

enum Command<'a> {
    Info,
    List(&'a str),
    Cat(&'a str),
}

fn print_geometry(geometry: &FilesystemGeometry) {
    println!("Volume name: {:?}", geometry.volume_name);
    println!("UUID: {}", geometry.uuid);
    println!("Revision: {}", geometry.revision);
    println!("Cluster size: {:#X}", geometry.bytes_per_cluster);
    println!("Cluster count: {}", geometry.cluster_count);
    println!("Clusters per group: {}", geometry.clusters_per_group);
    println!("Inode count: {}", geometry.inode_count);
    println!("Inodes per group: {}", geometry.inodes_per_group);
    println!("Inode size: {}", geometry.bytes_per_inode);
    println!("Reserved GDT clusters: {}", geometry.reserved_gdt_clusters);
    println!("Compatible features: {:?}", geometry.feature_compat);
    println!("Incompatible features: {:?}", geometry.feature_incompat);
    println!("Read-only compatible features: {:?}", geometry.feature_ro_compat);
    println!("Num block groups: {}", geometry.group_count);
    for (i, group) in geometry.groups.iter().enumerate() {
        println!("{i}: {group:#X?}");
    }
}

mod logging {
    /// Dummy type to help us implement a logger using the `log` crate.
    struct Logger;

    static LOGGER: Logger = Logger;

    impl log::Log for Logger {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                // SGR foreground colors. White is actually kinda grey.
                let color = match record.level() {
                    log::Level::Error => 31,
                    log::Level::Warn => 33,
                    log::Level::Info => 32,
                    log::Level::Debug | log::Level::Trace => 37,
                };
                eprintln!("\x1b[{color}m[{}]\x1b[0m {}", record.level(), record.args());
            }
        }

        fn flush(&self) {}
    }

    /// Installs the stderr logger. The level comes from `EXT2_LOG` (`error`,
    /// `warn`, `info`, `debug`, `trace` or `off`) and defaults to `warn`.
    pub(crate) fn init() {
        let level = std::env::var("EXT2_LOG")
            .ok()
            .and_then(|level| level.parse().ok())
            .unwrap_or(log::LevelFilter::Warn);
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(level);
        }
        log::debug!("Logging initialized");
    }
}
