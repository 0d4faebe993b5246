use crate::core::ai::{AiProvider, QaService};
use crate::core::embedding::EmbeddingProvider;
use crate::core::errors::RagError;
use crate::core::vector_store::VectorStore;
use anyhow::{Context, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

pub const PROMPT: &str = "Type a question and press enter: ";

/// Question loop on stdin/stdout. Ends at EOF.
pub async fn run<E, S, P>(qa: &QaService<E, S, P>) -> Result<()>
where
    E: EmbeddingProvider,
    S: VectorStore,
    P: AiProvider,
{
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();
    println!("Ready to chat! Press Ctrl-D to quit.");
    repl(qa, stdin, &mut stdout).await
}

pub async fn repl<E, S, P, R, W>(qa: &QaService<E, S, P>, input: R, out: &mut W) -> Result<()>
where
    E: EmbeddingProvider,
    S: VectorStore,
    P: AiProvider,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        write!(out, "{}", PROMPT)?;
        out.flush()?;

        let Some(line) = lines.next_line().await.context("failed to read question")? else {
            writeln!(out)?;
            break;
        };

        let question = line.trim();
        if question.is_empty() {
            continue;
        }

        match qa.ask(question).await {
            Ok(answer) => writeln!(out, "{}", answer)?,
            // Bad input, not a failure: report it and keep asking.
            Err(err @ RagError::InputTooLarge { .. }) => writeln!(out, "{}", err)?,
            Err(err) => return Err(err).context("failed to answer question"),
        }
    }

    Ok(())
}
