use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::process::ExitCode;

mod commands;

fn build_cli() -> Command {
    Command::new("narrivo")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Narrivo contributors")
        .about("Audiobook and ebook library with read-along")
        .arg(
            Arg::new("config-dir")
                .short('c')
                .long("config-dir")
                .value_name("DIR")
                .help("Directory for config and library data (defaults to the platform directories)")
                .global(true),
        )
        .subcommand(Command::new("init").about("Write a default config file and create the data directory"))
        .subcommand(Command::new("seed").about("Add the built-in public-domain catalog to the library"))
        .subcommand(
            Command::new("import")
                .about("Import audio or text files, merging them into matching books")
                .arg(
                    Arg::new("files")
                        .required(true)
                        .num_args(1..)
                        .value_name("FILE")
                        .help("Files to import"),
                )
                .arg(
                    Arg::new("yes")
                        .short('y')
                        .long("yes")
                        .help("Accept uncertain matches without asking")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("list").about("List all books in the library"))
        .subcommand(
            Command::new("info")
                .about("Show detailed information about a book")
                .arg(Arg::new("id").required(true).value_name("BOOK_ID").help("Book ID")),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete a book from the library")
                .arg(Arg::new("id").required(true).value_name("BOOK_ID").help("Book ID to delete"))
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .help("Skip confirmation prompt")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("download")
                .about("Download every remote asset of a book")
                .arg(Arg::new("id").required(true).value_name("BOOK_ID").help("Book ID to download")),
        )
        .subcommand(
            Command::new("bookmark")
                .about("Add an audio bookmark to a book")
                .arg(Arg::new("id").required(true).value_name("BOOK_ID").help("Book ID"))
                .arg(
                    Arg::new("seconds")
                        .required(true)
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(f64))
                        .help("Position in seconds"),
                )
                .arg(Arg::new("note").short('n').long("note").value_name("TEXT").help("Note to attach")),
        )
        .subcommand(
            Command::new("read-along")
                .about("Show which paragraph of a text is highlighted at an audio position")
                .arg(Arg::new("file").required(true).value_name("TEXT_FILE").help("Chapter text, paragraphs separated by blank lines"))
                .arg(
                    Arg::new("position")
                        .short('p')
                        .long("position")
                        .required(true)
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(f64))
                        .help("Audio position in seconds"),
                )
                .arg(
                    Arg::new("duration")
                        .short('d')
                        .long("duration")
                        .required(true)
                        .value_name("SECONDS")
                        .value_parser(clap::value_parser!(f64))
                        .help("Track duration in seconds"),
                ),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let matches = build_cli().get_matches();

    match run(&matches).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            commands::report_error(err);
            ExitCode::FAILURE
        }
    }
}

async fn run(matches: &ArgMatches) -> Result<()> {
    let config_dir = matches.get_one::<String>("config-dir").map(|s| s.as_str());

    match matches.subcommand() {
        Some(("init", _)) => commands::init(config_dir).context("Failed to initialize Narrivo"),
        Some(("read-along", sub_matches)) => commands::read_along(sub_matches),
        Some((name, sub_matches)) => {
            let mut library = commands::Library::open(config_dir).await?;
            match name {
                "seed" => commands::seed(&mut library).await,
                "import" => commands::import(&mut library, sub_matches).await,
                "list" => commands::list_books(&library),
                "info" => commands::show_book_info(&library, sub_matches),
                "delete" => commands::delete_book(&mut library, sub_matches).await,
                "download" => commands::download_book(&mut library, sub_matches).await,
                "bookmark" => commands::add_bookmark(&mut library, sub_matches).await,
                _ => {
                    build_cli().print_help()?;
                    Ok(())
                }
            }
        }
        None => {
            build_cli().print_help()?;
            Ok(())
        }
    }
}
