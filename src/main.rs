//! Command line access to a shop's media manager.
//!
//! Folders are directories and media items are files. Paths are slash
//! separated and relative to `--root`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::{error, info, LevelFilter};

use shopware_mediafs::auth::client_credentials::ClientCredentialsAuth;
use shopware_mediafs::config::{MediaFsConfig, ProjectConfig};
use shopware_mediafs::fs::{DirEntry, Filesystem, MediaFs, RootKind};
use shopware_mediafs::log_appender::setup_logging;
use shopware_mediafs::pacer::Pacer;
use shopware_mediafs::shopware_service::http_client::HttpClient;
use shopware_mediafs::shopware_service::shopware_client::ShopwareClient;

fn path_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).value_name("PATH").help(help).required(true)
}

fn cli() -> Command {
    Command::new("mediafs")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Browse and change a Shopware media manager like a filesystem")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Settings file (defaults to the platform config directory)")
                .global(true),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .value_name("URL")
                .help("Shop base URL")
                .global(true),
        )
        .arg(
            Arg::new("client-id")
                .long("client-id")
                .value_name("ID")
                .help("Integration access key id")
                .global(true),
        )
        .arg(
            Arg::new("client-secret")
                .long("client-secret")
                .value_name("SECRET")
                .help("Integration secret access key")
                .global(true),
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("PATH")
                .help("Directory inside the media manager to treat as root")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log debug output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("ls")
                .about("List a directory")
                .arg(Arg::new("path").value_name("PATH").help("Directory to list")),
        )
        .subcommand(
            Command::new("mkdir")
                .about("Create a directory and any missing parents")
                .arg(path_arg("path", "Directory to create")),
        )
        .subcommand(
            Command::new("rmdir")
                .about("Remove a directory")
                .arg(path_arg("path", "Directory to remove")),
        )
        .subcommand(
            Command::new("put")
                .about("Upload a local file")
                .arg(
                    Arg::new("local")
                        .value_name("LOCAL")
                        .help("Local file")
                        .required(true),
                )
                .arg(path_arg("remote", "Destination path")),
        )
        .subcommand(
            Command::new("cat")
                .about("Write a file's content to stdout")
                .arg(path_arg("remote", "File to read")),
        )
        .subcommand(
            Command::new("rm")
                .about("Delete a file")
                .arg(path_arg("remote", "File to delete")),
        )
        .subcommand(
            Command::new("mv")
                .about("Move or rename a file")
                .arg(path_arg("src", "File to move"))
                .arg(path_arg("dst", "New path")),
        )
        .subcommand(
            Command::new("mvdir")
                .about("Move or rename a directory")
                .arg(path_arg("src", "Directory to move"))
                .arg(path_arg("dst", "New path")),
        )
}

/// Optional argument, empty when absent
fn opt_arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .unwrap_or_default()
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("missing argument {}", name))
}

/// Settings file, then environment, then command line flags
fn load_config(matches: &ArgMatches) -> Result<MediaFsConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => MediaFsConfig::load_from_file(Path::new(path))
            .with_context(|| format!("Failed to load settings from {}", path))?,
        None => ProjectConfig::new()?.settings,
    };
    config.apply_env();

    if let Some(url) = matches.get_one::<String>("url") {
        config.shop_url = url.clone();
    }
    if let Some(id) = matches.get_one::<String>("client-id") {
        config.client_id = id.clone();
    }
    if let Some(secret) = matches.get_one::<String>("client-secret") {
        config.client_secret = secret.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_dir = directories::ProjectDirs::from("com", "shopware-mediafs", "mediafs")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."));

    if let Err(e) = setup_logging(&log_dir, level) {
        let _ = env_logger::Builder::new().filter_level(level).try_init();
        error!("Failed to set up file logging, logging to stderr only: {}", e);
    }
}

async fn open_fs(config: &MediaFsConfig, root: &str) -> Result<MediaFs> {
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;
    let auth = Arc::new(ClientCredentialsAuth::new(
        client.clone(),
        &config.shop_url,
        &config.client_id,
        &config.client_secret,
    ));
    let transport = Arc::new(HttpClient::new(
        client,
        &config.shop_url,
        &config.api_version,
        auth,
    ));
    let pacer = Arc::new(Pacer::new(config.pacer.clone()));
    let shopware = ShopwareClient::new(transport, pacer.clone());

    let cancel = pacer.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling outstanding requests");
            cancel.cancel();
        }
    });

    let (fs, kind) = MediaFs::new("shopware", root, shopware).await?;
    if let RootKind::File(name) = kind {
        info!("{} is a file, operating on its directory", name);
    }
    Ok(fs)
}

fn print_entry(entry: &DirEntry) {
    match entry {
        DirEntry::Dir(dir) => println!(
            "{:>12}  {}  {}/",
            "-",
            dir.mod_time.format("%Y-%m-%d %H:%M:%S"),
            dir.name()
        ),
        DirEntry::Object(object) => println!(
            "{:>12}  {}  {}",
            object.size(),
            object.mod_time().format("%Y-%m-%d %H:%M:%S"),
            object.name()
        ),
    }
}

async fn run(fs: &MediaFs, command: &str, args: &ArgMatches) -> Result<()> {
    match command {
        "ls" => {
            let mut entries = fs.list(opt_arg(args, "path")).await?;
            entries.sort_by(|a, b| b.is_dir().cmp(&a.is_dir()).then(a.name().cmp(b.name())));
            for entry in &entries {
                print_entry(entry);
            }
        }
        "mkdir" => fs.mkdir(arg(args, "path")?).await?,
        "rmdir" => fs.rmdir(arg(args, "path")?).await?,
        "put" => {
            let local = arg(args, "local")?;
            let content = tokio::fs::read(local)
                .await
                .with_context(|| format!("Failed to read {}", local))?;
            let object = fs
                .put(arg(args, "remote")?, &content, Some(content.len() as u64))
                .await?;
            info!("Stored {} ({} bytes, id {})", object.remote(), object.size(), object.id());
        }
        "cat" => {
            let object = fs.new_object(arg(args, "remote")?).await?;
            let content = object.open().await?;
            std::io::stdout()
                .write_all(&content)
                .context("Failed to write to stdout")?;
        }
        "rm" => fs.delete(arg(args, "remote")?).await?,
        "mv" => {
            let mut object = fs.new_object(arg(args, "src")?).await?;
            fs.move_object(&mut object, arg(args, "dst")?).await?;
            info!("Moved to {}", object.remote());
        }
        "mvdir" => fs.dir_move(arg(args, "src")?, arg(args, "dst")?).await?,
        other => return Err(anyhow!("unknown command {}", other)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let (command, args) = matches
        .subcommand()
        .ok_or_else(|| anyhow!("no command given"))?;
    init_logging(args.get_flag("verbose"));

    let config = load_config(args)?;
    let fs = open_fs(&config, opt_arg(args, "root")).await?;
    info!("Using {}", fs);

    run(&fs, command, args).await
}
