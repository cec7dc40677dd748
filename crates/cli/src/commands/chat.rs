//! `crabot chat` — Interactive or single-message consultation.

use std::io::Write;

use crabot_agent::Consultant;
use crabot_core::error::{Error, ProviderError};
use crabot_core::message::Role;
use crabot_core::session::Session;
use tokio::io::{self, AsyncBufReadExt, BufReader};

use super::{load_config, print_missing_key_help};

/// A line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Message(&'a str),
    New,
    Save,
    Report,
    Profile(Option<(&'a str, &'a str)>),
    Stats,
    Help,
    Exit,
    Unknown(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        if matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q") {
            return Self::Exit;
        }
        let Some(command) = line.strip_prefix('/') else {
            return Self::Message(line);
        };

        let (name, rest) = command
            .split_once(char::is_whitespace)
            .map(|(n, r)| (n, r.trim()))
            .unwrap_or((command, ""));
        match name {
            "new" => Self::New,
            "save" => Self::Save,
            "report" => Self::Report,
            "stats" => Self::Stats,
            "help" => Self::Help,
            "profile" if rest.is_empty() => Self::Profile(None),
            "profile" => match rest.split_once(char::is_whitespace) {
                Some((key, value)) => Self::Profile(Some((key, value.trim()))),
                None => Self::Unknown(line),
            },
            _ => Self::Unknown(line),
        }
    }
}

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let consultant = Consultant::from_config(&config);

    // Without a key no turn can run, so show setup help up front
    if !consultant.has_credential() {
        print_missing_key_help();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let mut session = Session::create();

    if let Some(msg) = message {
        // Single message mode
        let ok = stream_turn(&consultant, &mut session, &msg, "").await?;
        if !ok {
            return Err("The consultation turn failed.".into());
        }
        return Ok(());
    }

    print_banner(&consultant, &config.default_provider);
    print_assistant(welcome(&session));

    let reader = BufReader::new(io::stdin());
    let mut lines = reader.lines();
    let mut report_hinted = false;

    prompt()?;
    while let Some(line) = lines.next_line().await? {
        match Input::parse(&line) {
            Input::Exit => break,
            Input::Message("") => {}
            Input::Message(text) => {
                stream_turn(&consultant, &mut session, text, "  Consultant > ").await?;
                if !report_hinted && consultant.report_ready(&session) {
                    report_hinted = true;
                    println!("  Tip: enough material for a report. Type /report to generate it.");
                    println!();
                }
            }
            Input::New => {
                session = session.reset();
                report_hinted = false;
                println!("  Started a new session ({}).", session.id());
                println!();
                print_assistant(welcome(&session));
            }
            Input::Save => save(&consultant, &session),
            Input::Report => report(&consultant, &session).await,
            Input::Profile(None) => {
                if session.profile().is_empty() {
                    println!("  No profile entries. Use /profile <key> <value>.");
                }
                for (key, value) in session.profile() {
                    println!("  {key}: {value}");
                }
                println!();
            }
            Input::Profile(Some((key, value))) => {
                session.set_profile(key, value);
                println!("  Saved {key} = {value}");
                println!();
            }
            Input::Stats => print_stats(&session),
            Input::Help => print_help(),
            Input::Unknown(line) => {
                println!("  Unknown command: {line}. Type /help for the list.");
                println!();
            }
        }
        prompt()?;
    }

    println!();
    println!("  Goodbye! Stay safe out there.");
    println!();

    Ok(())
}

/// Stream one reply to stdout. Returns whether the turn succeeded.
async fn stream_turn(
    consultant: &Consultant,
    session: &mut Session,
    text: &str,
    prefix: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut stream = match consultant.start_turn(session, text).await {
        Ok(stream) => stream,
        Err(Error::Provider(ProviderError::MissingCredential)) => {
            print_missing_key_help();
            return Ok(false);
        }
        Err(e) => {
            eprintln!("  [Error] {e}");
            return Ok(false);
        }
    };

    let mut out = std::io::stdout();
    if !prefix.is_empty() {
        println!();
        print!("{prefix}");
    }
    out.flush()?;

    while let Some(chunk) = stream.next_chunk().await {
        print!("{chunk}");
        out.flush()?;
    }
    let reply = stream.finish().await;

    if reply.is_error() {
        // Anything already printed was discarded from the transcript
        println!();
        println!("{}", reply.text);
    }
    println!();
    if !prefix.is_empty() {
        println!();
    }
    Ok(!reply.is_error())
}

fn welcome(session: &Session) -> &str {
    session
        .transcript()
        .first()
        .map(|t| t.content.as_str())
        .unwrap_or_default()
}

fn save(consultant: &Consultant, session: &Session) {
    if !consultant.export_ready(session) {
        println!("  Nothing to save yet. Have a few exchanges first.");
        println!();
        return;
    }
    match consultant.export_session(session) {
        Ok(path) => println!("  💾 Session saved to {}", path.display()),
        Err(e) => eprintln!("  [Error] Could not save session: {e}"),
    }
    println!();
}

async fn report(consultant: &Consultant, session: &Session) {
    if !consultant.report_ready(session) {
        println!(
            "  Not enough conversation for a report yet ({} turns so far).",
            session.transcript().len()
        );
        println!();
        return;
    }

    eprintln!("  Generating comprehensive CRA report...");
    match consultant.generate_report(session).await {
        Ok(report) => {
            println!();
            println!("{}", report.markdown);
            println!();
            match consultant.export_report(&report) {
                Ok(path) => println!("  📥 Report saved to {}", path.display()),
                Err(e) => eprintln!("  [Error] Could not save report: {e}"),
            }
        }
        Err(e) => eprintln!("  Error generating report: {e}"),
    }
    println!();
}

fn print_stats(session: &Session) {
    let transcript = session.transcript();
    let count = |role: Role| transcript.iter().filter(|t| t.role == role).count();
    println!("  Session:    {}", session.id());
    println!("  Turns:      {}", transcript.len());
    println!("  You:        {}", count(Role::User));
    println!("  Consultant: {}", count(Role::Assistant));
    println!("  Errors:     {}", transcript.iter().filter(|t| t.error).count());
    println!();
}

fn print_banner(consultant: &Consultant, provider: &str) {
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║   🚒 Community Risk Assessment Consultant     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {provider}");
    println!("  Model:     {}", consultant.model());
    println!("  Knowledge: {:?}", consultant.knowledge_source());
    println!();
    println!("  Answer one question at a time. Type /help for commands.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();
}

fn print_help() {
    println!("  /new                   Start a new session");
    println!("  /save                  Save the session as JSON");
    println!("  /report                Generate and save the CRA report");
    println!("  /profile               Show profile entries");
    println!("  /profile <key> <value> Set a profile entry");
    println!("  /stats                 Show session statistics");
    println!("  exit                   Quit");
    println!();
}

fn print_assistant(text: &str) {
    for line in text.lines() {
        println!("  Consultant > {line}");
    }
    println!();
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}
