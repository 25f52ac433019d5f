use std::{io::BufRead, process::ExitCode};

use clap::Parser;
use log::LevelFilter;

use totpgen::{Options, TotpError};

#[derive(Parser)]
#[command(version, about = "Generate TOTP codes from otpauth:// URIs or base32 secrets")]
struct Args {
    #[arg(help = "URI to generate a code for, otpauth://totp/...")]
    uri: Option<String>,

    #[arg(long, help = "Base32 secret, replaces the secret of the URI")]
    secret: Option<String>,

    #[arg(long)]
    digits: Option<u32>,

    #[arg(long, help = "SHA1, SHA256 or SHA512")]
    algorithm: Option<String>,

    #[arg(long, help = "Period in seconds")]
    period: Option<u64>,

    #[arg(long, allow_negative_numbers = true, help = "Seconds since UNIX_EPOCH [default: now]")]
    time: Option<i64>,

    #[arg(long, default_value_t = LevelFilter::Warn)]
    log_level: LevelFilter,
}

fn read_uri(mut input: impl BufRead) -> std::io::Result<String> {
    let mut buf = String::new();
    input.read_line(&mut buf)?;
    Ok(buf)
}

fn options(uri: Option<String>, args: Args) -> Result<Options, TotpError> {
    let mut opts = match uri {
        Some(uri) => uri.trim().parse()?,
        None => Options::default(),
    };

    if let Some(secret) = args.secret {
        opts.secret = secret;
    }
    if let Some(digits) = args.digits {
        opts.digits = digits;
    }
    if let Some(algorithm) = args.algorithm {
        opts.algorithm = algorithm;
    }
    if let Some(period) = args.period {
        opts.period = period;
    }
    opts.unix_time = args.time;

    Ok(opts)
}

fn main() -> ExitCode {
    let mut args = Args::parse();

    env_logger::builder()
        .filter_level(args.log_level)
        .parse_default_env()
        .init();

    let uri = match (args.uri.take(), &args.secret) {
        (None, None) => match read_uri(std::io::stdin().lock()) {
            Ok(uri) => Some(uri),
            Err(e) => {
                eprintln!("Error reading input: {e}");
                return ExitCode::FAILURE;
            }
        },
        (uri, _) => uri,
    };

    match options(uri, args).and_then(|opts| opts.generate()) {
        Ok(code) => {
            println!("{code}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
