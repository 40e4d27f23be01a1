//! Interactive REPL implementation

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::engine::Session;
use crate::error::{Result, SlateError};
use crate::output::{format_outcome, OutputFormat};
use crate::runtime::Value;

pub fn run_repl(session: &Session, format: OutputFormat) -> Result<()> {
    let mut rl = DefaultEditor::new()
        .map_err(|e| SlateError::RuntimeFault(e.to_string()))?;

    println!("Slate v{} - Interactive Session", env!("CARGO_PKG_VERSION"));
    println!("Type 'help' for commands, 'exit' to quit\n");

    // Buffer for multi-line input (brace-delimited blocks)
    let mut input_buffer = String::new();
    let mut block_depth: i32 = 0;

    loop {
        let prompt = if block_depth > 0 {
            format!("{}...> ", "  ".repeat(block_depth as usize))
        } else {
            "slate> ".to_string()
        };

        let readline = rl.readline(&prompt);
        match readline {
            Ok(line) => {
                let line = line.trim_end();

                if block_depth == 0 {
                    let bare = line.trim();
                    match bare.to_lowercase().as_str() {
                        "" => continue,
                        "exit" | "quit" | "q" => {
                            println!("Goodbye!");
                            break;
                        }
                        "help" | "?" => {
                            print_help(session);
                            continue;
                        }
                        "clear" | "cls" => {
                            print!("\x1B[2J\x1B[1;1H");
                            continue;
                        }
                        _ => {}
                    }

                    let _ = rl.add_history_entry(bare);

                    // %%name args: block command, body up to an empty line
                    if let Some(rest) = bare.strip_prefix("%%") {
                        let (name, args) = split_command(rest);
                        let body = read_block_body(&mut rl)?;
                        print_command(session.run_command(&name, &args, Some(&body)));
                        continue;
                    }
                    // %name args: line command
                    if let Some(rest) = bare.strip_prefix('%') {
                        let (name, args) = split_command(rest);
                        print_command(session.run_command(&name, &args, None));
                        continue;
                    }
                }

                // Track brace depth for multi-line constructs. Braces
                // inside string literals are not understood.
                block_depth += brace_delta(line);
                if block_depth < 0 {
                    block_depth = 0;
                }

                if !input_buffer.is_empty() {
                    input_buffer.push('\n');
                }
                input_buffer.push_str(line);

                if block_depth > 0 {
                    continue;
                }

                let fragment = std::mem::take(&mut input_buffer);
                let outcome = session.execute(&fragment);
                let text = format_outcome(&outcome, &format);
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
            Err(ReadlineError::Interrupted) => {
                input_buffer.clear();
                block_depth = 0;
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(e) => {
                eprintln!("Readline error: {}", e);
                break;
            }
        }
    }

    Ok(())
}

fn read_block_body(rl: &mut DefaultEditor) -> Result<String> {
    let mut body_lines = Vec::new();
    loop {
        match rl.readline("...   ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    break;
                }
                body_lines.push(line);
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(e) => return Err(SlateError::RuntimeFault(e.to_string())),
        }
    }
    Ok(body_lines.join("\n"))
}

fn split_command(rest: &str) -> (String, String) {
    let rest = rest.trim();
    match rest.split_once(char::is_whitespace) {
        Some((name, args)) => (name.to_string(), args.trim().to_string()),
        None => (rest.to_string(), String::new()),
    }
}

fn brace_delta(line: &str) -> i32 {
    let mut delta = 0;
    for c in line.chars() {
        match c {
            '{' => delta += 1,
            '}' => delta -= 1,
            _ => {}
        }
    }
    delta
}

fn print_command(result: Result<Value>) {
    match result {
        Ok(Value::Null) => {}
        Ok(Value::Str(s)) if s.is_empty() => {}
        Ok(value) => println!("{}", value.to_text()),
        Err(error) => eprintln!("Error: {}", error),
    }
}

fn print_help(session: &Session) {
    println!("Fragments are executed against the persistent namespace.");
    println!("Bindings survive across inputs; `_` holds the last result.\n");

    let listing = session.list_commands();
    println!("Line commands (%name args):");
    for name in &listing.line_forms {
        let help = session.describe_command(name, false);
        println!("  %{:<10} {}", name, help.summary);
    }
    println!("Block commands (%%name, body ends at an empty line):");
    for name in &listing.block_forms {
        let help = session.describe_command(name, true);
        println!("  %%{:<9} {}", name, help.summary);
    }
    println!("\nREPL: help, clear, exit\n");
}
