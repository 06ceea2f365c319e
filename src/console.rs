//! Interactive gates between demo steps

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::debug;

type Input = Box<dyn AsyncBufRead + Send + Unpin>;

/// Prompts the operator, or passes straight through when non-interactive
///
/// One reader serves every prompt, so lines typed ahead are kept for the
/// next one.
pub struct Console {
    input: Option<Mutex<Input>>,
}

impl Console {
    pub fn new(interactive: bool) -> Self {
        if interactive {
            Self::with_input(BufReader::new(tokio::io::stdin()))
        } else {
            Self { input: None }
        }
    }

    /// Prompt on stdout and read replies from `input`
    pub fn with_input(input: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            input: Some(Mutex::new(Box::new(input))),
        }
    }

    /// Show `message` and wait for Enter; a closed input also continues
    pub async fn wait_key(&self, message: &str) -> Result<()> {
        let Some(input) = &self.input else {
            debug!("Skipping prompt: {}", message);
            return Ok(());
        };

        println!("{}", message);
        let mut line = String::new();
        input.lock().await.read_line(&mut line).await?;
        Ok(())
    }
}
