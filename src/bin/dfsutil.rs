use dfsutil::error::{DfsUtilError, Result};
use dfsutil::io::FsInputStream;
use dfsutil::DfsUtil;

use std::process::exit;

use clap::{Arg, ArgAction, ArgMatches, Command};

use tokio::io::AsyncWriteExt;

use tracing::error;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let path = || Arg::new("path").help("The complete path.");
    let src = || Arg::new("src").help("Source path");
    let dst = || Arg::new("dst").help("Destination path");

    Command::new("dfsutil")
        .about("Runs filesystem chores against the configured filesystem.")
        .subcommand_required(true)
        .subcommand(
            Command::new("mkdir")
                .about("Creates a new directory (equivalent to `mkdir -p` on Unix systems).")
                .arg(path()),
        )
        .subcommand(
            Command::new("rmr")
                .about("Recursively deletes a directory or file.")
                .arg(path()),
        )
        .subcommand(
            Command::new("put")
                .about("Uploads a local file or directory from `src` to remote `dst`")
                .arg(src())
                .arg(dst())
                .arg(
                    Arg::new("delete-src")
                        .long("delete-src")
                        .action(ArgAction::SetTrue)
                        .help("Deletes the local source after the upload"),
                )
                .arg(
                    Arg::new("overwrite")
                        .long("overwrite")
                        .action(ArgAction::SetTrue)
                        .help("Replaces existing remote files"),
                ),
        )
        .subcommand(
            Command::new("get")
                .about("Downloads a remote file `src` to local destination `dst`")
                .arg(src())
                .arg(dst()),
        )
        .subcommand(
            Command::new("chmod")
                .about("Changes permissions, e.g. `744` or `rwxr--r--`.")
                .arg(Arg::new("mode").help("The new mode"))
                .arg(path()),
        )
        .subcommand(
            Command::new("chown")
                .about("Recursively changes the owner of a path.")
                .arg(Arg::new("owner").help("The new owner"))
                .arg(path()),
        )
        .subcommand(
            Command::new("test")
                .about("Exits with 0 if the path exists, 1 otherwise.")
                .arg(path()),
        )
        .subcommand(
            Command::new("append")
                .about("Appends a local file (or stdin) to a remote file.")
                .arg(path())
                .arg(Arg::new("local").help("Local file, stdin if omitted")),
        )
        .subcommand(
            Command::new("ls")
                .about("Recursively lists all files below a directory.")
                .arg(path())
                .arg(
                    Arg::new("ext")
                        .long("ext")
                        .default_value("")
                        .help("Only list files ending with this suffix"),
                ),
        )
        .subcommand(
            Command::new("subdirs")
                .about("Lists the direct subdirectories of a directory.")
                .arg(path())
                .arg(
                    Arg::new("pattern")
                        .long("pattern")
                        .help("Only list names containing this pattern"),
                ),
        )
        .subcommand(
            Command::new("mv")
                .about("Moves `src` to `dst`")
                .arg(src())
                .arg(dst()),
        )
        .subcommand(
            Command::new("cp")
                .about("Copies `src` to `dst` within the filesystem")
                .arg(src())
                .arg(dst()),
        )
        .subcommand(
            Command::new("cat")
                .about("Prints the content of a file.")
                .arg(path()),
        )
        .subcommand(
            Command::new("touchz")
                .about("Creates an empty file.")
                .arg(path()),
        )
        .subcommand(
            Command::new("count")
                .about("Reports number of directories, files and bytes below a path.")
                .arg(path()),
        )
}

fn required<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a str> {
    args.get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| DfsUtilError::ArgMissingError(format!("{} required", name)))
}

async fn execute(dfs: &DfsUtil, matches: &ArgMatches) -> Result<i32> {
    match matches.subcommand() {
        Some(("mkdir", args)) => {
            dfs.mkdir(required(args, "path")?).await?;
        }
        Some(("rmr", args)) => {
            let path = required(args, "path")?;
            if !dfs.clear_dir(path).await? {
                eprintln!("rmr: '{}': No such file or directory", path);
                return Ok(1);
            }
        }
        Some(("put", args)) => {
            dfs.put(
                required(args, "src")?,
                required(args, "dst")?,
                args.get_flag("delete-src"),
                args.get_flag("overwrite"),
            )
            .await?;
        }
        Some(("get", args)) => {
            dfs.get(required(args, "src")?, required(args, "dst")?)
                .await?;
        }
        Some(("chmod", args)) => {
            dfs.change_permission(required(args, "path")?, required(args, "mode")?)
                .await?;
        }
        Some(("chown", args)) => {
            dfs.change_files_owner(required(args, "path")?, required(args, "owner")?)
                .await?;
        }
        Some(("test", args)) => {
            if !dfs.check(required(args, "path")?).await? {
                return Ok(1);
            }
        }
        Some(("append", args)) => {
            let path = required(args, "path")?;
            let appended = match args.get_one::<String>("local") {
                Some(local) => {
                    let mut file = tokio::fs::File::open(local).await?;
                    dfs.append_content(&mut file, path).await?
                }
                None => dfs.append_content(&mut tokio::io::stdin(), path).await?,
            };
            println!("Appended {} bytes", appended);
        }
        Some(("ls", args)) => {
            let ext = required(args, "ext")?;
            for file in dfs.list_file(required(args, "path")?, ext).await? {
                println!("{}", file);
            }
        }
        Some(("subdirs", args)) => {
            let pattern = args.get_one::<String>("pattern").map(String::as_str);
            for dir in dfs
                .files_under_folder(required(args, "path")?, pattern)
                .await?
            {
                println!("{}", dir);
            }
        }
        Some(("mv", args)) => {
            let src = required(args, "src")?;
            let dst = required(args, "dst")?;
            if !dfs.move_file(src, dst).await? {
                eprintln!("mv: cannot move '{}' to '{}'", src, dst);
                return Ok(1);
            }
        }
        Some(("cp", args)) => {
            dfs.copy_file(required(args, "src")?, required(args, "dst")?)
                .await?;
        }
        Some(("cat", args)) => {
            let mut input = dfs.open(required(args, "path")?).await?;
            let mut stdout = tokio::io::stdout();
            let mut buf = vec![0; 1024];
            loop {
                let read = input.read(&mut buf).await?;
                if read == 0 {
                    break;
                }
                stdout.write_all(&buf[..read]).await?;
            }
            stdout.flush().await?;
        }
        Some(("touchz", args)) => {
            let path = required(args, "path")?;
            if !dfs.create_new_file(path).await? {
                eprintln!("touchz: '{}': File exists", path);
                return Ok(1);
            }
        }
        Some(("count", args)) => {
            let path = required(args, "path")?;
            let summary = dfs.file_statuses(path).await?;
            println!(
                "{:>12} {:>12} {:>18} {}",
                summary.directory_count, summary.file_count, summary.length, path
            );
        }
        Some((subcommand, _)) => {
            eprintln!("Unrecognized command: '{}'", subcommand);
            return Ok(1);
        }
        None => return Ok(1),
    }

    Ok(0)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let matches = cli().get_matches();

    let dfs = match DfsUtil::new() {
        Ok(dfs) => dfs,
        Err(err) => {
            error!("Could not set up filesystem: {}", err);
            exit(1);
        }
    };

    let code = match execute(&dfs, &matches).await {
        Ok(code) => code,
        Err(err) => {
            error!("{}", err);
            1
        }
    };

    if let Err(err) = dfs.destroy().await {
        error!("Could not close filesystem: {}", err);
        exit(1);
    }

    exit(code);
}
