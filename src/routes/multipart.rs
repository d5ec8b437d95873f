//! Multipart intake: uploads are staged to disk chunk by chunk as they arrive

use std::collections::HashMap;
use std::fmt::Display;

use axum::extract::Multipart;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::pipeline::Pipeline;
use crate::session::{SessionId, SessionStore, StagedFile};

/// `?session=<id>` to run an operation inside a pre-allocated session
#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    pub session: Option<String>,
}

/// Parsed multipart form with every upload already staged
#[derive(Debug, Default)]
pub struct UploadForm {
    /// Staged uploads in the order they were sent
    pub files: Vec<StagedFile>,

    /// `paths` values, from repeated fields or a JSON array
    pub paths: Vec<String>,

    fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Checkbox-style boolean (`true`, `on`, `1`, `yes`)
    pub fn flag(&self, key: &str) -> bool {
        self.text(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "on" | "1" | "yes"))
            .unwrap_or(false)
    }

    /// Non-empty password, if any
    pub fn password(&self) -> Option<String> {
        self.text("password")
            .filter(|p| !p.is_empty())
            .map(str::to_string)
    }

    /// The single archive upload for unzip, peek and selection
    pub fn single_file(&mut self) -> Result<StagedFile> {
        if self.files.is_empty() {
            return Err(AppError::BadRequest("No archive uploaded".to_string()));
        }
        Ok(self.files.remove(0))
    }
}

/// Read the whole form, staging file parts named in `file_fields`
pub async fn read_form(
    sessions: &SessionStore,
    session: SessionId,
    multipart: &mut Multipart,
    file_fields: &[&str],
) -> Result<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(mut field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();
        let file_name = field.file_name().map(str::to_string);

        match file_name {
            Some(file_name) if file_fields.contains(&name.as_str()) => {
                let mut writer = sessions.begin_stage(session, &file_name).await?;
                while let Some(chunk) = field.chunk().await? {
                    writer.write_chunk(&chunk).await?;
                }
                let staged = writer.finish().await?;

                tracing::debug!(
                    session_id = %session,
                    field = %name,
                    file = %staged.name,
                    bytes = staged.size,
                    "Received upload"
                );
                form.files.push(staged);
            }
            Some(_) => {
                tracing::debug!(session_id = %session, field = %name, "Ignoring unexpected file field");
            }
            None => {
                let value = field.text().await?;
                if name == "paths" {
                    form.paths.extend(parse_paths(&value));
                } else {
                    form.fields.insert(name, value);
                }
            }
        }
    }

    Ok(form)
}

/// One path, or a JSON array of paths
fn parse_paths(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(paths) = serde_json::from_str::<Vec<String>>(trimmed) {
            return paths;
        }
    }
    vec![raw.to_string()]
}

/// Send the terminal error event for failures outside the pipeline
pub fn or_abort<T, E: Display>(
    pipeline: &Pipeline,
    session: SessionId,
    result: std::result::Result<T, E>,
) -> std::result::Result<T, E> {
    if let Err(e) = &result {
        pipeline.abort(session, &e.to_string());
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_paths() {
        assert_eq!(parse_paths("a/b.txt"), vec!["a/b.txt"]);
        assert_eq!(parse_paths(r#"["a.txt", "b/c.txt"]"#), vec!["a.txt", "b/c.txt"]);
        assert_eq!(parse_paths(""), vec![""]);
        assert_eq!(parse_paths("[not json"), vec!["[not json"]);
    }

    #[test]
    fn test_form_flags_and_password() {
        let mut form = UploadForm::default();
        form.fields.insert("stripMetadata".to_string(), "TRUE".to_string());
        form.fields.insert("password".to_string(), String::new());

        assert!(form.flag("stripMetadata"));
        assert!(!form.flag("missing"));
        assert_eq!(form.password(), None);
        assert!(form.single_file().is_err());
    }
}
