//! Interactive query session.
//!
//! Each input line is either the `exit` command, a blank line (ignored), or
//! a question. A question runs retrieval against the project's collection,
//! hands the context to the [`AnswerGateway`], and yields the answer.
//!
//! Endpoint failures come back from the gateway as ordinary answer text, so
//! the loop keeps going. Every other error ends the session.

use anyhow::{anyhow, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use projrag_core::embedding::Embedder;
use projrag_core::index::VectorIndex;
use projrag_core::retrieve::{retrieve, Retrieval, RetrievalParams};

use crate::answer::{AnswerGateway, ChatGateway};
use crate::config::Config;
use crate::project_fs::check_project_name;
use crate::retrieve_cmd::{format_distances, RetrievalStack};

const PROMPT: &str = "Query (or type 'exit' to quit): ";

/// Result of one question.
#[derive(Debug)]
pub struct Turn {
    pub retrieval: Retrieval,
    pub answer: String,
}

#[derive(Debug)]
pub enum SessionStep {
    Exit,
    Skip,
    Answer(Turn),
}

/// `exit`, ignoring case and surrounding whitespace.
pub fn is_exit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("exit")
}

pub struct QuerySession<'a> {
    index: &'a dyn VectorIndex,
    embedder: &'a dyn Embedder,
    gateway: &'a dyn AnswerGateway,
    project: String,
    params: RetrievalParams,
}

impl<'a> QuerySession<'a> {
    pub fn new(
        index: &'a dyn VectorIndex,
        embedder: &'a dyn Embedder,
        gateway: &'a dyn AnswerGateway,
        project: &str,
        params: RetrievalParams,
    ) -> Self {
        Self {
            index,
            embedder,
            gateway,
            project: project.to_string(),
            params,
        }
    }

    pub async fn ask(&self, question: &str) -> Result<Turn> {
        let retrieval = retrieve(
            self.index,
            self.embedder,
            &self.project,
            question,
            &self.params,
        )
        .await?;
        let answer = self.gateway.answer(&retrieval.context, question).await?;
        Ok(Turn { retrieval, answer })
    }

    pub async fn handle(&self, line: &str) -> Result<SessionStep> {
        if is_exit(line) {
            return Ok(SessionStep::Exit);
        }
        let question = line.trim();
        if question.is_empty() {
            return Ok(SessionStep::Skip);
        }
        Ok(SessionStep::Answer(self.ask(question).await?))
    }
}

fn print_turn(turn: &Turn, show_distances: bool) {
    if show_distances {
        eprintln!();
        eprint!("{}", format_distances(&turn.retrieval.ranked));
    }
    println!();
    println!("AI Response:");
    println!("{}", turn.answer);
}

/// `projrag query <project>`: read questions until `exit`, Ctrl-D or Ctrl-C.
pub async fn run_query_session(
    config: &Config,
    project: &str,
    show_distances: bool,
) -> Result<()> {
    check_project_name(project)?;
    let stack = RetrievalStack::open(config).await?;
    let gateway = ChatGateway::new(&config.llm)?;
    let session = QuerySession::new(
        &stack.index,
        stack.embedder.as_ref(),
        &gateway,
        project,
        config.retrieval.params(),
    );

    let result = repl(&session, show_distances).await;
    stack.close().await;
    result
}

async fn repl(session: &QuerySession<'_>, show_distances: bool) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!("Inference session started. Type your query below.");

    loop {
        println!();
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => return Err(anyhow!("Readline error: {}", err)),
        };

        match session.handle(&line).await? {
            SessionStep::Exit => break,
            SessionStep::Skip => continue,
            SessionStep::Answer(turn) => {
                let _ = editor.add_history_entry(line.trim());
                print_turn(&turn, show_distances);
            }
        }
    }

    Ok(())
}

/// `projrag ask <project> <question>`: one question, one answer.
pub async fn run_ask(
    config: &Config,
    project: &str,
    question: &str,
    show_distances: bool,
) -> Result<()> {
    check_project_name(project)?;
    let stack = RetrievalStack::open(config).await?;
    let gateway = ChatGateway::new(&config.llm)?;
    let session = QuerySession::new(
        &stack.index,
        stack.embedder.as_ref(),
        &gateway,
        project,
        config.retrieval.params(),
    );

    let result = session.ask(question).await;
    stack.close().await;
    print_turn(&result?, show_distances);
    Ok(())
}
