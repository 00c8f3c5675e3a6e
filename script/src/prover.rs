//! Proving backends. The default one shells out to an external prover.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use smashcash_lib::error::{Error, Result};
use smashcash_lib::witness::{ProofBlob, WithdrawalWitness};
use tokio::process::Command;
use tracing::{debug, info};

#[async_trait]
pub trait ProvingBackend: Send + Sync {
    /// Prove the withdrawal witness. Never retried by the caller.
    async fn prove(&self, witness: &WithdrawalWitness) -> Result<ProofBlob>;
}

/// Runs `<program> [args..] <input.json> <circuit> <proving key> <output.json>`
/// and reads `{ "proof": "0x…", "publicSignals": [...] }` from the output.
///
/// Both files live in a temporary directory that is removed once the
/// proof has been read, so the witness never outlives the call.
#[derive(Debug, Clone)]
pub struct CommandProver {
    program: String,
    args: Vec<String>,
    circuit: PathBuf,
    proving_key: PathBuf,
}

impl CommandProver {
    pub fn new(program: impl Into<String>, circuit: impl Into<PathBuf>, proving_key: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            circuit: circuit.into(),
            proving_key: proving_key.into(),
        }
    }

    /// Parse a command line such as `"node prove.js"` into program and
    /// leading arguments.
    pub fn from_command_line(
        command: &str,
        circuit: impl Into<PathBuf>,
        proving_key: impl Into<PathBuf>,
    ) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| Error::ProofGenerationFailed("empty prover command".into()))?;
        Ok(Self::new(program, circuit, proving_key).with_args(words))
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    async fn run(&self, input: &Path, output: &Path) -> Result<()> {
        let result = Command::new(&self.program)
            .args(&self.args)
            .arg(input)
            .arg(&self.circuit)
            .arg(&self.proving_key)
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::ProofGenerationFailed(format!("cannot start {}: {e}", self.program)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::ProofGenerationFailed(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ProvingBackend for CommandProver {
    async fn prove(&self, witness: &WithdrawalWitness) -> Result<ProofBlob> {
        let workdir = tempfile::tempdir()
            .map_err(|e| Error::ProofGenerationFailed(format!("cannot create work dir: {e}")))?;
        let input = workdir.path().join("input.json");
        let output = workdir.path().join("proof.json");

        let json = serde_json::to_vec(&witness.to_circuit_input())
            .map_err(|e| Error::ProofGenerationFailed(e.to_string()))?;
        tokio::fs::write(&input, json)
            .await
            .map_err(|e| Error::ProofGenerationFailed(format!("cannot write witness: {e}")))?;

        info!(program = %self.program, "generating proof");
        self.run(&input, &output).await?;

        let proof = tokio::fs::read_to_string(&output)
            .await
            .map_err(|e| Error::ProofGenerationFailed(format!("prover wrote no proof: {e}")))?;
        let blob = ProofBlob::from_json(&proof)?;
        debug!(bytes = blob.proof.len(), signals = blob.public_signals.len(), "proof ready");
        Ok(blob)
    }
}
