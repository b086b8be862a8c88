mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use session::Session;

const DEFAULT_API_KEY: &str = "speak-friend";

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: door-emulator [--key <api-key>] [--transcript <path>]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options.api_key, options.transcript.as_deref())?;
    let mut line = String::new();

    writeln!(
        writer,
        "Gandalf Door Controller emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

struct Options {
    api_key: String,
    transcript: Option<String>,
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        api_key: DEFAULT_API_KEY.to_string(),
        transcript: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--key=") {
            options.api_key = value.to_string();
        } else if arg == "--key" {
            options.api_key = args.next().ok_or("Expected value after --key")?;
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(value.to_string());
        } else if arg == "--transcript" {
            options.transcript = Some(args.next().ok_or("Expected value after --transcript")?);
        } else {
            return Err(format!("Unknown argument `{arg}`"));
        }
    }

    Ok(options)
}
