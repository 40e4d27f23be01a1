//! Slate CLI - a persistent session shell for automated agents

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use slate::cli::{Args, SubCommand};
use slate::output::json::{
    attributes_to_json, completion_to_json, error_to_json, fault_reply_to_json, inspect_to_json,
    signature_to_json,
};
use slate::script::{has_errors, validate_script, ScriptRunner, ValidationOptions, ValidationSeverity};
use slate::{format_outcome, OutputFormat, Session, SessionConfig};

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let format = if args.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    let mut config = SessionConfig {
        allow_effects: args.allow_effects,
        verbose: args.verbose,
        ..SessionConfig::default()
    };
    if let Some(dir) = args.state_dir {
        config.state_dir = dir;
    }
    if let Some(installer) = args.installer {
        config.installer = installer;
    }

    let session = Arc::new(Session::new(config));

    if !args.no_restore {
        session.restore();
    }

    let save_on_exit = !args.no_save;
    if save_on_exit {
        let handler_session = Arc::clone(&session);
        ctrlc::set_handler(move || {
            handler_session.save();
            std::process::exit(130);
        })
        .context("failed to install shutdown handler")?;
    }

    match args.command {
        SubCommand::Exec { fragment } => {
            let outcome = session.execute(&fragment);
            let text = format_outcome(&outcome, &format);
            if !text.is_empty() {
                println!("{}", text);
            }
        }

        SubCommand::Run { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("cannot read {}", file.display()))?;

            let options = ValidationOptions {
                allow_effects: args.allow_effects,
            };
            let issues = validate_script(&content, &options);
            for issue in issues
                .iter()
                .filter(|i| i.severity == ValidationSeverity::Warning)
            {
                eprintln!("Warning: {}", issue);
            }
            if has_errors(&issues) {
                for issue in issues
                    .iter()
                    .filter(|i| i.severity == ValidationSeverity::Error)
                {
                    eprintln!("Error: {}", issue);
                }
                anyhow::bail!("script validation failed");
            }

            let runner = ScriptRunner::new(&session, format, args.verbose);
            let result = runner.run_file(&file)?;
            if !result.success {
                if save_on_exit {
                    session.save();
                }
                anyhow::bail!(result.error.unwrap_or_else(|| "script failed".to_string()));
            }
            if args.verbose {
                println!(
                    "\n--- Script completed: {} segments executed ---",
                    result.segments_executed
                );
            }
        }

        SubCommand::Names { filter } => {
            let names = session.list_names(filter.as_deref());
            if args.json {
                println!("{}", serde_json::json!(names));
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }

        SubCommand::Inspect { name, detail } => match session.inspect(&name, detail) {
            Ok(reply) => {
                if args.json {
                    println!("{}", inspect_to_json(&reply));
                } else {
                    println!("type:      {}", reply.type_name);
                    println!("rendering: {}", reply.rendering);
                    if let Some(doc) = &reply.docstring {
                        println!("doc:       {}", doc);
                    }
                    if let Some(source) = &reply.source {
                        println!("source:\n{}", source);
                    }
                }
            }
            Err(error) => {
                if args.json {
                    println!("{}", error_to_json(&error));
                } else {
                    eprintln!("Error: {}", error);
                }
            }
        },

        SubCommand::Complete { text, cursor } => {
            let reply = session.complete(&text, cursor);
            if args.json {
                println!("{}", completion_to_json(&reply));
            } else {
                for candidate in &reply.candidates {
                    println!("{}", candidate);
                }
            }
        }

        SubCommand::Signature { name } => match session.signature(&name) {
            Ok(reply) => {
                if args.json {
                    println!("{}", signature_to_json(&reply));
                } else {
                    println!("{}", reply.signature_text);
                    if !reply.docstring.is_empty() {
                        println!("{}", reply.docstring);
                    }
                    if let Some(location) = &reply.defining_location {
                        println!("defined in: {}", location);
                    }
                }
            }
            Err(error) => {
                if args.json {
                    println!("{}", error_to_json(&error));
                } else {
                    eprintln!("Error: {}", error);
                }
            }
        },

        SubCommand::Attrs {
            name,
            pattern,
            include_private,
        } => match session.list_attributes(&name, Some(&pattern), include_private) {
            Ok(reply) => {
                if args.json {
                    println!("{}", attributes_to_json(&reply));
                } else {
                    println!("attributes: {}", reply.attributes.join(" "));
                    println!("callables:  {}", reply.callables.join(" "));
                    println!("properties: {}", reply.properties.join(" "));
                }
            }
            Err(error) => {
                if args.json {
                    println!("{}", error_to_json(&error));
                } else {
                    eprintln!("Error: {}", error);
                }
            }
        },

        SubCommand::LastFault => {
            let reply = session.last_fault();
            if args.json {
                println!("{}", fault_reply_to_json(&reply));
            } else if reply.present {
                println!(
                    "{}: {}",
                    reply.kind.unwrap_or_default(),
                    reply.message.unwrap_or_default()
                );
            } else {
                println!("no fault recorded");
            }
        }

        SubCommand::Commands => {
            let listing = session.list_commands();
            if args.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "line_forms": listing.line_forms,
                        "block_forms": listing.block_forms,
                    })
                );
            } else {
                println!("Line commands:");
                for name in &listing.line_forms {
                    let help = session.describe_command(name, false);
                    println!("  %{:<10} {}", name, help.summary);
                }
                println!("Block commands:");
                for name in &listing.block_forms {
                    let help = session.describe_command(name, true);
                    println!("  %%{:<9} {}", name, help.summary);
                }
            }
        }

        #[cfg(feature = "repl")]
        SubCommand::Repl => {
            slate::repl::run_repl(&session, format)?;
        }
        #[cfg(not(feature = "repl"))]
        SubCommand::Repl => {
            eprintln!("REPL support not enabled. Rebuild with --features repl");
            std::process::exit(1);
        }
    }

    if save_on_exit {
        session.save();
    }

    Ok(())
}
