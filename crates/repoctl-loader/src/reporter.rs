//! Progress reporting, mirroring the teacher's publish-engine
//! `Reporter` trait: a minimal `info`/`warn`/`error` sink the caller
//! supplies so the loader's core logic stays decoupled from where
//! diagnostics end up (§1 Non-goals: no pager UI, just text).

pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Writes to stdout/stderr — what `repoctl-load`'s `main` wires up.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn info(&mut self, msg: &str) {
        println!("{msg}");
    }

    fn warn(&mut self, msg: &str) {
        eprintln!("warning: {msg}");
    }

    fn error(&mut self, msg: &str) {
        eprintln!("error: {msg}");
    }
}

/// Collects messages in memory instead of printing them, for tests and
/// for embedding the loader in the server process.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub info: Vec<String>,
    pub warn: Vec<String>,
    pub error: Vec<String>,
}

impl Reporter for RecordingReporter {
    fn info(&mut self, msg: &str) {
        self.info.push(msg.to_string());
    }

    fn warn(&mut self, msg: &str) {
        self.warn.push(msg.to_string());
    }

    fn error(&mut self, msg: &str) {
        self.error.push(msg.to_string());
    }
}
