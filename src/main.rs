use std::{process::ExitCode, sync::Arc, time::SystemTime};

use clap::{Arg, ArgAction, ArgMatches};
use time::format_description::well_known::Rfc3339;
use tokio::{io::AsyncWriteExt, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, span, Instrument, Level};

use objectgw::{
    model::s3::PutOptions, util::range::parse_range, FsGateway, GatewayError, GatewayOptions,
    LocalFs, ObjectLayer, WalkErrorPolicy,
};

const WALK_BUFFER: usize = 64;

fn cli() -> clap::Command {
    let key = || Arg::new("KEY").required(true).index(1);
    let prefix = || Arg::new("PREFIX").index(1).default_value("");

    clap::Command::new("objectgw")
        .about("Serve a directory tree as a single object storage bucket")
        .arg(Arg::new("ROOT").required(true).index(1))
        .arg(Arg::new("bucket").long("bucket").help("bucket name, defaults to the root directory name"))
        .arg(Arg::new("json").long("json").action(ArgAction::SetTrue).help("log in json format"))
        .arg(Arg::new("quiet").long("quiet").action(ArgAction::SetTrue).help("only log warnings and errors"))
        .arg(
            Arg::new("skip-walk-errors")
                .long("skip-walk-errors")
                .action(ArgAction::SetTrue)
                .help("keep walking when a subdirectory cannot be read"),
        )
        .subcommand_required(true)
        .subcommand(clap::Command::new("buckets").about("List buckets"))
        .subcommand(
            clap::Command::new("ls")
                .about("List one directory level")
                .arg(prefix())
                .arg(Arg::new("delimiter").long("delimiter").default_value("/"))
                .arg(Arg::new("marker").long("marker").default_value(""))
                .arg(
                    Arg::new("max-keys")
                        .long("max-keys")
                        .value_parser(clap::value_parser!(i32))
                        .allow_negative_numbers(true)
                        .default_value("1000"),
                ),
        )
        .subcommand(clap::Command::new("stat").about("Show object info").arg(key()))
        .subcommand(
            clap::Command::new("cat")
                .about("Write an object to stdout")
                .arg(key())
                .arg(Arg::new("range").long("range").help("e.g. bytes=0-99")),
        )
        .subcommand(
            clap::Command::new("put")
                .about("Upload a local file")
                .arg(key())
                .arg(Arg::new("FILE").required(true).index(2))
                .arg(Arg::new("md5").long("md5").help("expected md5 of FILE, hex")),
        )
        .subcommand(
            clap::Command::new("rm")
                .about("Delete objects")
                .arg(Arg::new("KEY").required(true).num_args(1..)),
        )
        .subcommand(
            clap::Command::new("walk")
                .about("Recursively list leaf objects")
                .arg(prefix()),
        )
}

fn format_time(t: SystemTime) -> String {
    time::OffsetDateTime::from(t)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "-".to_string())
}

fn arg<'a>(matches: &'a ArgMatches, name: &str) -> &'a str {
    matches
        .get_one::<String>(name)
        .map(|s| s.as_str())
        .unwrap_or("")
}

async fn run(
    layer: &dyn ObjectLayer,
    bucket: &str,
    ctx: &CancellationToken,
    matches: &ArgMatches,
) -> Result<(), GatewayError> {
    match matches.subcommand() {
        Some(("buckets", _)) => {
            for info in layer.list_buckets(ctx).await? {
                println!("{} {}", format_time(info.created), info.name);
            }
        }
        Some(("ls", sub)) => {
            let max_keys = sub.get_one::<i32>("max-keys").copied().unwrap_or(-1);
            let listing = layer
                .list_objects(
                    ctx,
                    bucket,
                    arg(sub, "PREFIX"),
                    arg(sub, "marker"),
                    arg(sub, "delimiter"),
                    max_keys,
                )
                .await?;

            for prefix in &listing.prefixes {
                println!("{:>36} {}", "PRE", prefix);
            }
            for object in &listing.objects {
                println!(
                    "{} {:>10} {}",
                    format_time(object.modified_time),
                    object.size,
                    object.name
                );
            }
            if let Some(marker) = listing.next_marker {
                println!("truncated, next marker: {}", marker);
            }
        }
        Some(("stat", sub)) => {
            let info = layer.get_object_info(ctx, bucket, arg(sub, "KEY")).await?;
            println!("name:     {}", info.name);
            println!("bucket:   {}", info.bucket);
            println!("size:     {}", info.size);
            println!("modified: {}", format_time(info.modified_time));
            println!("dir:      {}", info.is_dir);
        }
        Some(("cat", sub)) => {
            let range = match sub.get_one::<String>("range") {
                Some(header) => Some(parse_range(header)?),
                None => None,
            };

            let mut stdout = tokio::io::stdout();
            layer
                .get_object(ctx, bucket, arg(sub, "KEY"), range, &mut stdout)
                .await?;
            stdout.flush().await?;
        }
        Some(("put", sub)) => {
            let mut file = tokio::fs::File::open(arg(sub, "FILE")).await?;
            let opts = PutOptions {
                md5_hex: sub.get_one::<String>("md5").cloned(),
            };

            let info = layer
                .put_object(ctx, bucket, arg(sub, "KEY"), &mut file, &opts)
                .await?;
            println!(
                "{} {} {}",
                info.etag.unwrap_or_default(),
                info.size,
                info.name
            );
        }
        Some(("rm", sub)) => {
            let keys: Vec<String> = sub
                .get_many::<String>("KEY")
                .map(|keys| keys.cloned().collect())
                .unwrap_or_default();

            let results = layer.delete_objects(ctx, bucket, &keys).await;
            for (key, res) in keys.iter().zip(&results) {
                match res {
                    Ok(deleted) => println!("deleted: {}", deleted.object_name),
                    Err(err) => println!("failed:  {} ({})", key, err),
                }
            }

            if let Some(err) = results.into_iter().find_map(|res| res.err()) {
                return Err(err);
            }
        }
        Some(("walk", sub)) => {
            let (tx, mut rx) = mpsc::channel(WALK_BUFFER);
            layer.walk(ctx, bucket, arg(sub, "PREFIX"), tx).await?;

            while let Some(item) = rx.recv().await {
                let info = item?;
                println!("{:>10} {}", info.size, info.name);
            }
        }
        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli().get_matches();

    let level = if matches.get_flag("quiet") {
        Level::WARN
    } else {
        Level::INFO
    };
    if matches.get_flag("json") {
        tracing_subscriber::fmt()
            .json()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .init();
    }

    let span = span!(Level::INFO, "main", context = "main");
    let gateway = span.in_scope(|| {
        info!("called");

        let root = arg(&matches, "ROOT");
        let options = GatewayOptions {
            bucket: matches.get_one::<String>("bucket").cloned(),
            walk_errors: if matches.get_flag("skip-walk-errors") {
                WalkErrorPolicy::SkipSubtree
            } else {
                WalkErrorPolicy::Abort
            },
        };

        let gateway = FsGateway::new(Arc::new(LocalFs::new(root)), options);
        info!(root = root, bucket = %gateway.bucket, "args");
        gateway
    });
    let bucket = gateway.bucket.clone();

    let ctx = CancellationToken::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let res = run(&gateway, &bucket, &ctx, &matches)
        .instrument(span.clone())
        .await;

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            span.in_scope(|| error!(error_message=%err, error_group="command"));
            eprintln!("objectgw: {}", err);
            ExitCode::FAILURE
        }
    }
}
