use anyhow::{anyhow, bail, Result};

pub const HELP: &str = "commands: add <title> | toggle <n> | rm <n> | ls | refresh | help | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    /// 1-based index into the list as last rendered.
    Toggle(usize),
    Remove(usize),
    List,
    Refresh,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Command> {
    let line = line.trim();
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .unwrap_or((line, ""));

    match verb {
        "add" | "a" => {
            if rest.is_empty() {
                bail!("usage: add <title>");
            }
            Ok(Command::Add(rest.to_string()))
        }
        "toggle" | "t" => Ok(Command::Toggle(parse_index(rest)?)),
        "rm" | "delete" => Ok(Command::Remove(parse_index(rest)?)),
        "ls" | "" => Ok(Command::List),
        "refresh" => Ok(Command::Refresh),
        "help" | "?" => Ok(Command::Help),
        "quit" | "exit" | "q" => Ok(Command::Quit),
        other => Err(anyhow!("unknown command `{other}`; {HELP}")),
    }
}

fn parse_index(raw: &str) -> Result<usize> {
    match raw.parse::<usize>() {
        Ok(0) | Err(_) => bail!("expected an item number starting at 1, got `{raw}`"),
        Ok(index) => Ok(index),
    }
}
