//! Demo operations served by `cmdrun-server`.
use std::time::Duration;

use async_trait::async_trait;
use cmdrun_core::{CommandIo, CoreError, Operation, OperationError, OperationRegistry};

const GROUP: &str = "test_app";

/// Catalog of every demo operation.
pub fn registry() -> Result<OperationRegistry, CoreError> {
    OperationRegistry::new()
        .with(NoArgs)?
        .with(WithArgs)?
        .with(MultiWordArgs)?
        .with(LongRunning)
}

fn unrecognized(args: &[&String]) -> OperationError {
    let joined: Vec<&str> = args.iter().map(|a| a.as_str()).collect();
    OperationError::Usage(format!("unrecognized arguments: {}", joined.join(" ")))
}

/// Prints a message, waits, prints again.
pub struct NoArgs;

#[async_trait]
impl Operation for NoArgs {
    fn name(&self) -> &str {
        "no_args_command"
    }

    fn group(&self) -> &str {
        GROUP
    }

    fn help(&self) -> &str {
        "A simple test command that prints a message and waits."
    }

    async fn run(&self, args: &[String], io: &mut CommandIo) -> Result<(), OperationError> {
        if !args.is_empty() {
            return Err(unrecognized(&args.iter().collect::<Vec<_>>()));
        }
        io.outln("Starting the simple test command...");
        tokio::time::sleep(Duration::from_secs(2)).await;
        io.outln("Doing some work...");
        tokio::time::sleep(Duration::from_secs(3)).await;
        io.outln("Test command finished successfully!");
        Ok(())
    }
}

/// `NAME [--shout]`.
pub struct WithArgs;

#[async_trait]
impl Operation for WithArgs {
    fn name(&self) -> &str {
        "with_args_command"
    }

    fn group(&self) -> &str {
        GROUP
    }

    fn help(&self) -> &str {
        "A test command that accepts arguments."
    }

    fn usage(&self) -> Option<String> {
        Some("with_args_command name [--shout]".into())
    }

    async fn run(&self, args: &[String], io: &mut CommandIo) -> Result<(), OperationError> {
        let shout = args.iter().any(|a| a == "--shout");
        let (names, extra): (Vec<&String>, Vec<&String>) = args
            .iter()
            .filter(|a| *a != "--shout")
            .partition(|a| !a.starts_with("--"));

        let Some((name, rest)) = names.split_first() else {
            return Err(OperationError::Usage(
                "the following arguments are required: name".into(),
            ));
        };
        if !rest.is_empty() || !extra.is_empty() {
            let mut unknown = rest.to_vec();
            unknown.extend(extra);
            return Err(unrecognized(&unknown));
        }

        let name = if shout {
            name.to_uppercase()
        } else {
            name.to_string()
        };
        io.outln(format!("Hello, {name}!"));
        io.outln(format!("Successfully greeted {name}."));
        Ok(())
    }
}

/// `[--title WORD...] [--author WORD...]`.
pub struct MultiWordArgs;

#[async_trait]
impl Operation for MultiWordArgs {
    fn name(&self) -> &str {
        "multi_word_args_command"
    }

    fn group(&self) -> &str {
        GROUP
    }

    fn help(&self) -> &str {
        "A test command that accepts arguments with multiple words."
    }

    fn usage(&self) -> Option<String> {
        Some("multi_word_args_command [--title TITLE [TITLE ...]] [--author AUTHOR [AUTHOR ...]]".into())
    }

    async fn run(&self, args: &[String], io: &mut CommandIo) -> Result<(), OperationError> {
        let mut title: Vec<&str> = Vec::new();
        let mut author: Vec<&str> = Vec::new();
        let mut current: Option<&mut Vec<&str>> = None;
        let mut stray: Vec<&String> = Vec::new();

        for arg in args {
            match arg.as_str() {
                "--title" => current = Some(&mut title),
                "--author" => current = Some(&mut author),
                flag if flag.starts_with("--") => stray.push(arg),
                word => match current.as_deref_mut() {
                    Some(words) => words.push(word),
                    None => stray.push(arg),
                },
            }
        }
        if !stray.is_empty() {
            return Err(unrecognized(&stray));
        }

        let (title, author) = (title.join(" "), author.join(" "));
        if title.is_empty() && author.is_empty() {
            return Err(OperationError::Failed(
                "At least one of --title or --author must be provided.".into(),
            ));
        }
        if !title.is_empty() {
            io.outln(format!("Title: {title}"));
        }
        if !author.is_empty() {
            io.outln(format!("Author: {author}"));
        }
        io.outln("Successfully processed arguments.");
        Ok(())
    }
}

/// Runs for a minute, reporting progress every five seconds.
pub struct LongRunning;

#[async_trait]
impl Operation for LongRunning {
    fn name(&self) -> &str {
        "long_running_command"
    }

    fn group(&self) -> &str {
        GROUP
    }

    fn help(&self) -> &str {
        "A test command that runs for 60+ seconds to test long-running scenarios."
    }

    async fn run(&self, _args: &[String], io: &mut CommandIo) -> Result<(), OperationError> {
        io.outln("Starting long-running command...");
        for step in 1..=12u64 {
            tokio::time::sleep(Duration::from_secs(5)).await;
            io.outln(format!("Progress: {} seconds elapsed... Still working!", step * 5));
        }
        io.outln("Long-running command completed successfully after 60 seconds!");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cmdrun_core::{Catalog, runner::run_inline};

    use super::*;

    fn args(s: &str) -> Vec<String> {
        cmdrun_model::split_arguments(s)
    }

    #[test]
    fn registry_lists_every_demo_command() {
        let names: Vec<String> = registry().unwrap().list().into_iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            [
                "long_running_command",
                "multi_word_args_command",
                "no_args_command",
                "with_args_command"
            ]
        );
    }

    #[tokio::test]
    async fn with_args_greets_and_shouts() {
        let catalog = registry().unwrap();
        let rec = run_inline(&catalog, "with_args_command", args("TestName --shout")).await;
        assert_eq!(rec.output, "Hello, TESTNAME!\nSuccessfully greeted TESTNAME.\n");
        assert!(rec.error.is_empty());

        let rec = run_inline(&catalog, "with_args_command", args("Ann")).await;
        assert!(rec.output.starts_with("Hello, Ann!\n"));
    }

    #[tokio::test]
    async fn with_args_usage_errors() {
        let catalog = registry().unwrap();
        let rec = run_inline(&catalog, "with_args_command", Vec::new()).await;
        assert!(rec.output.is_empty());
        assert!(rec.error.contains("required: name"));

        let rec = run_inline(&catalog, "with_args_command", args("a b --loud")).await;
        assert!(rec.error.contains("unrecognized arguments: b --loud"));
    }

    #[tokio::test]
    async fn multi_word_joins_words() {
        let catalog = registry().unwrap();
        let rec = run_inline(
            &catalog,
            "multi_word_args_command",
            args("--title The Great Gatsby --author F. Scott Fitzgerald"),
        )
        .await;
        assert_eq!(
            rec.output,
            "Title: The Great Gatsby\nAuthor: F. Scott Fitzgerald\nSuccessfully processed arguments.\n"
        );
    }

    #[tokio::test]
    async fn multi_word_needs_one_option() {
        let catalog = registry().unwrap();
        let rec = run_inline(&catalog, "multi_word_args_command", Vec::new()).await;
        assert_eq!(rec.error, "At least one of --title or --author must be provided.");

        let rec = run_inline(&catalog, "multi_word_args_command", args("loose --title x")).await;
        assert!(rec.error.contains("unrecognized arguments: loose"));
    }

    #[tokio::test(start_paused = true)]
    async fn no_args_prints_three_lines() {
        let catalog = registry().unwrap();
        let rec = run_inline(&catalog, "no_args_command", Vec::new()).await;
        assert_eq!(
            rec.output,
            "Starting the simple test command...\nDoing some work...\nTest command finished successfully!\n"
        );
    }
}
