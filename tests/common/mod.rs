//! Shared test support: a CommandRunner that answers from a script.
#![allow(dead_code)]

use driver_manager::error::AppError;
use driver_manager::system::{CommandOutput, CommandRunner, CommandSpec, LineSink};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

type Handler = Arc<dyn Fn(&CommandSpec) -> CommandOutput + Send + Sync>;

pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        status: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

pub fn failed(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        status: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

/// Answers commands by their full display form (`pkexec pacman -S ...`).
/// Handlers registered per program take precedence. Anything unscripted
/// exits 127, so `which <tool>` reports the tool as missing.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: Mutex<HashMap<String, CommandOutput>>,
    handlers: Mutex<HashMap<String, Handler>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, command: &str, output: CommandOutput) -> Self {
        self.set(command, output);
        self
    }

    pub fn respond_ok(self, command: &str, stdout: &str) -> Self {
        self.respond(command, ok(stdout))
    }

    /// Make `which <tool>` succeed for each tool.
    pub fn with_tools(self, tools: &[&str]) -> Self {
        for tool in tools {
            self.set(&format!("which {}", tool), ok(&format!("/usr/bin/{}\n", tool)));
        }
        self
    }

    pub fn handler<F>(self, program: &str, f: F) -> Self
    where
        F: Fn(&CommandSpec) -> CommandOutput + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .unwrap()
            .insert(program.to_string(), Arc::new(f));
        self
    }

    /// Replace a response after the runner has been shared.
    pub fn set(&self, command: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), output);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn was_called(&self, command: &str) -> bool {
        self.count(command) > 0
    }

    fn answer(&self, spec: &CommandSpec) -> CommandOutput {
        let display = spec.display();
        self.calls.lock().unwrap().push(display.clone());
        let handler = self.handlers.lock().unwrap().get(&spec.program).cloned();
        if let Some(handler) = handler {
            return handler(spec);
        }
        self.responses
            .lock()
            .unwrap()
            .get(&display)
            .cloned()
            .unwrap_or_else(|| failed(127, &format!("not scripted: {}", display)))
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, spec: CommandSpec) -> BoxFuture<'static, Result<CommandOutput, AppError>> {
        let output = self.answer(&spec);
        Box::pin(async move { Ok(output) })
    }

    fn run_streaming(
        &self,
        spec: CommandSpec,
        mut sink: LineSink,
    ) -> BoxFuture<'static, Result<CommandOutput, AppError>> {
        let output = self.answer(&spec);
        Box::pin(async move {
            for line in output.stdout.lines() {
                sink(line);
            }
            Ok(output)
        })
    }
}

/// `df -BG --output=avail <path>` reporting plenty of space.
pub fn plenty_of_space(runner: ScriptedRunner, paths: &[&str]) -> ScriptedRunner {
    paths.iter().fold(runner, |runner, path| {
        runner.respond_ok(&format!("df -BG --output=avail {}", path), "Avail\n  120G\n")
    })
}
