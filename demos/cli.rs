use clap::{Parser, ValueEnum};
use tgconvert::SessionManager;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    /// Telethon string session (pass the string itself as INPUT/OUTPUT prints it)
    TelethonString,
    /// Telethon SQLite session file
    TelethonFile,
    /// Pyrogram string session
    PyrogramString,
    /// Pyrogram SQLite session file
    PyrogramFile,
    /// Telegram Desktop tdata folder
    Tdata,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source format
    #[arg(long, value_enum)]
    from: Format,

    /// Target format
    #[arg(long, value_enum)]
    to: Format,

    /// Session string, session file or tdata folder, depending on --from
    input: String,

    /// Output path (omit for string targets to print to stdout)
    output: Option<String>,

    /// Local passcode of the source tdata folder (if set)
    #[arg(short, long)]
    passcode: Option<String>,

    /// Proxy URL for live queries, e.g. socks5://127.0.0.1:9050
    #[arg(long)]
    proxy: Option<String>,

    /// Check the session against Telegram before converting
    #[arg(long)]
    validate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Setup logging
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut session = match args.from {
        Format::TelethonString => SessionManager::from_telethon_string(&args.input)?,
        Format::TelethonFile => SessionManager::from_telethon_file(&args.input).await?,
        Format::PyrogramString => SessionManager::from_pyrogram_string(&args.input)?,
        Format::PyrogramFile => SessionManager::from_pyrogram_file(&args.input).await?,
        Format::Tdata => match &args.passcode {
            Some(passcode) => {
                SessionManager::from_tdata_folder_with_passcode(&args.input, passcode)?
            }
            None => SessionManager::from_tdata_folder(&args.input)?,
        },
    };

    if let Some(proxy) = &args.proxy {
        session = session.with_proxy(proxy.clone());
    }

    println!("✅ Loaded session");
    println!("   DC ID:   {}", session.dc_id());
    println!(
        "   User ID: {}",
        session
            .user_id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "unknown".to_string())
    );

    if args.validate {
        let valid = session.validate().await?;
        println!("   Valid:   {}", if valid { "YES" } else { "NO" });
        anyhow::ensure!(valid, "session is dead or revoked, refusing to convert");
    }

    match (args.to, &args.output) {
        (Format::TelethonString, _) => println!("{}", session.to_telethon_string()),
        (Format::PyrogramString, _) => println!("{}", session.to_pyrogram_string()),
        (to, Some(output)) => {
            match to {
                Format::TelethonFile => session.to_telethon_file(output).await?,
                Format::PyrogramFile => session.to_pyrogram_file(output).await?,
                Format::Tdata => session.to_tdata_folder(output).await?,
                Format::TelethonString | Format::PyrogramString => unreachable!(),
            }
            println!("📂 Wrote {}", output);
        }
        (_, None) => anyhow::bail!("--to {:?} needs an OUTPUT path", args.to),
    }

    Ok(())
}
