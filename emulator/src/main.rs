mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use crossterm::style::Stylize;
use session::{Profile, Session};

struct Options {
    profile: Profile,
    transcript: Option<PathBuf>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("Usage: pedometer-emulator [--profile <standard|rapid>] [--transcript <path>]");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    let mut session = Session::new(options.profile, options.transcript.as_deref())?;
    let mut line = String::new();

    writeln!(
        writer,
        "Pedometer emulator ready ({} profile). Type `help` for commands or `exit` to quit.",
        options.profile.label()
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

        for response in session.handle_command(trimmed)? {
            print_styled(&mut writer, response)?;
        }
    }

    Ok(())
}

fn print_styled(writer: &mut impl Write, line: String) -> io::Result<()> {
    if line.starts_with("ERR") || line.contains("WARN") {
        writeln!(writer, "{}", line.red())
    } else if line.contains(" notify ") {
        writeln!(writer, "{}", line.cyan())
    } else if line.contains(" closed ") {
        writeln!(writer, "{}", line.green())
    } else if line.contains("link ") || line.contains("suspend") || line.contains("wake") {
        writeln!(writer, "{}", line.yellow())
    } else {
        writeln!(writer, "{line}")
    }
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        profile: Profile::Standard,
        transcript: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            options.profile = Profile::from_tag(value)?;
        } else if arg == "--profile" {
            let value = args.next().ok_or("Expected value after --profile")?;
            options.profile = Profile::from_tag(&value)?;
        } else if let Some(value) = arg.strip_prefix("--transcript=") {
            options.transcript = Some(PathBuf::from(value));
        } else if arg == "--transcript" {
            let value = args.next().ok_or("Expected path after --transcript")?;
            options.transcript = Some(PathBuf::from(value));
        } else {
            return Err(format!("Unexpected argument `{arg}`"));
        }
    }

    Ok(options)
}
