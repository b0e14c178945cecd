//! `ccr statusline`: one-line summary for Claude Code's status line

use std::{
  io::Read,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use ccr::{lifecycle::LifecycleStore, session::ModelOverride};
use serde::Deserialize;

/// The subset of Claude Code's status line payload we render
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct StatusInput {
  model: Option<ModelInfo>,
  workspace: Option<WorkspaceInfo>,
  cwd: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModelInfo {
  id: Option<String>,
  display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WorkspaceInfo {
  current_dir: Option<String>,
}

impl StatusInput {
  fn dir(&self) -> Option<PathBuf> {
    self
      .workspace
      .as_ref()
      .and_then(|w| w.current_dir.clone())
      .or_else(|| self.cwd.clone())
      .map(PathBuf::from)
  }

  fn model(&self) -> Option<&str> {
    let model = self.model.as_ref()?;
    model.display_name.as_deref().or(model.id.as_deref())
  }
}

/// Read the payload from stdin and print the status line
pub async fn cmd_statusline() -> Result<()> {
  let mut raw = String::new();
  std::io::stdin()
    .read_to_string(&mut raw)
    .context("Failed to read status line input")?;

  let input = parse_input(&raw).context("Invalid JSON in status line input")?;
  let dir = input.dir().unwrap_or_else(ccr::dirs::current_dir);
  let routed = read_override(&dir).await;

  println!("{}", render(&input, &dir, routed.as_ref()));
  Ok(())
}

fn parse_input(raw: &str) -> Result<StatusInput, serde_json::Error> {
  if raw.trim().is_empty() {
    return Ok(StatusInput::default());
  }
  serde_json::from_str(raw)
}

/// Model override of the session running in `dir`, if any
async fn read_override(dir: &Path) -> Option<ModelOverride> {
  let store = LifecycleStore::new(dir, ccr::dirs::default_shared_dir());
  let content = store.read_string(&store.model_override_file()).await?;
  serde_json::from_str(&content).ok()
}

fn render(input: &StatusInput, dir: &Path, routed: Option<&ModelOverride>) -> String {
  let mut parts = Vec::new();

  if let Some(name) = dir.file_name() {
    parts.push(name.to_string_lossy().into_owned());
  }

  match (routed, input.model()) {
    (Some(routed), _) => parts.push(format!("{} → {}", routed.provider, routed.model)),
    (None, Some(model)) => parts.push(model.to_string()),
    (None, None) => {}
  }

  parts.push("ccr".to_string());
  parts.join(" | ")
}
