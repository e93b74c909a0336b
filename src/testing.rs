//! Scripted in-memory engines for unit tests.

use std::{
    cell::RefCell,
    collections::{HashMap, VecDeque},
    rc::Rc,
    time::Duration,
};

use crate::engine::Engine;
use crate::engine_handle::{is_response_line, EngineConnection, EngineError, EngineLauncher};

/// How a scripted engine behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Answers `go` with each line in turn, then keeps repeating the last one. Like a real
    /// process, a line that does not complete a command leaves `go` unanswered and the
    /// command times out.
    Plays(Vec<&'static str>),
    /// Output closes on the handshake.
    DiesOnHandshake,
    /// Cannot be launched.
    Unlaunchable,
}

#[derive(Debug, Default)]
pub struct Journal {
    pub launched: Vec<String>,
    pub closed: Vec<String>,
    /// `(engine, command)` in the order they were received.
    pub commands: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone)]
pub struct ScriptedLauncher {
    scripts: HashMap<String, Script>,
    pub journal: Rc<RefCell<Journal>>,
}

impl ScriptedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, script: Script) -> Self {
        self.scripts.insert(name.to_owned(), script);
        self
    }

    pub fn engine(name: &str) -> std::sync::Arc<Engine> {
        std::sync::Arc::new(Engine::new(name, format!("/engines/{name}")))
    }

    pub fn closes(&self) -> usize {
        self.journal.borrow().closed.len()
    }

    pub fn launches(&self) -> usize {
        self.journal.borrow().launched.len()
    }
}

impl EngineLauncher for ScriptedLauncher {
    type Connection = ScriptedEngine;

    fn launch(&self, engine: &Engine) -> Result<ScriptedEngine, EngineError> {
        let script = self
            .scripts
            .get(&engine.name)
            .cloned()
            .unwrap_or(Script::Plays(vec!["bestmove resign"]));
        if let Script::Unlaunchable = script {
            return Err(EngineError::Spawn {
                path: engine.path_to_exe.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            });
        }
        self.journal.borrow_mut().launched.push(engine.name.clone());
        let answers = match &script {
            Script::Plays(lines) => lines.iter().copied().collect(),
            _ => VecDeque::new(),
        };
        Ok(ScriptedEngine {
            name: engine.name.clone(),
            script,
            answers,
            closed: false,
            journal: self.journal.clone(),
        })
    }
}

#[derive(Debug)]
pub struct ScriptedEngine {
    name: String,
    script: Script,
    answers: VecDeque<&'static str>,
    closed: bool,
    journal: Rc<RefCell<Journal>>,
}

impl ScriptedEngine {
    fn closed_output(&self) -> EngineError {
        EngineError::Protocol {
            engine: self.name.clone(),
            reason: "output stream closed".to_owned(),
        }
    }
}

impl EngineConnection for ScriptedEngine {
    fn send(&mut self, command: &str) -> Result<String, EngineError> {
        self.journal
            .borrow_mut()
            .commands
            .push((self.name.clone(), command.to_owned()));
        if self.closed {
            return Err(self.closed_output());
        }
        match (&self.script, command) {
            (Script::DiesOnHandshake, _) => Err(self.closed_output()),
            (_, "isready") => Ok("readyok".to_owned()),
            (_, "go") => {
                let answer = if self.answers.len() > 1 {
                    self.answers.pop_front()
                } else {
                    self.answers.front().copied()
                };
                match answer {
                    Some(line) if is_response_line(line) => Ok(line.to_owned()),
                    Some(_) => Err(EngineError::Timeout {
                        engine: self.name.clone(),
                        command: command.to_owned(),
                        timeout: Duration::ZERO,
                    }),
                    None => Err(self.closed_output()),
                }
            }
            _ => Ok("ok".to_owned()),
        }
    }

    fn close(&mut self) -> Result<(), EngineError> {
        if !self.closed {
            self.closed = true;
            self.journal.borrow_mut().closed.push(self.name.clone());
        }
        Ok(())
    }
}
