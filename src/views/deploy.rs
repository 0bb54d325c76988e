use crate::common::{NewEndpoint, Spec};
use crate::endpoint::parse_env_entry;
use crate::widgets::{FormField, FormState};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeployField {
    Spec,
    Name,
    Image,
    Replicas,
    MinReplicas,
    MaxReplicas,
    TaskTimeout,
    /// `KEY=value` pairs separated by `;`.
    Env,
    /// Optional, for private images.
    Credential,
}

/// Form creating an endpoint on one spec of the catalog.
pub type DeployForm = FormState<DeployField>;

impl DeployForm {
    pub fn for_spec(spec: &Spec) -> Self {
        FormState::new(
            format!("Create endpoint on {}", spec.spec_name),
            vec![
                (DeployField::Spec, FormField::locked("Spec:", &spec.spec_name)),
                (DeployField::Name, FormField::text("Name:", default_name(&spec.spec_name))),
                (DeployField::Image, FormField::text("Docker image:", "")),
                (DeployField::Replicas, FormField::text("Replicas:", 1)),
                (DeployField::MinReplicas, FormField::text("Min replicas:", 0)),
                (DeployField::MaxReplicas, FormField::text("Max replicas:", 3)),
                (DeployField::TaskTimeout, FormField::text("Timeout (s):", 3600)),
                (DeployField::Env, FormField::text("Env:", "")),
                (DeployField::Credential, FormField::text("Registry login:", "")),
            ],
        )
        .with_hint("Env takes KEY=value pairs separated by ;")
    }

    /// The request body, or what is wrong with the form.
    pub fn draft(&self) -> Result<NewEndpoint, String> {
        let task_timeout = match self.parse::<u64>(DeployField::TaskTimeout) {
            Ok(secs) if secs > 0 => secs,
            _ => return Err("Timeout must be a positive number of seconds".to_string()),
        };

        let mut env = BTreeMap::new();
        for entry in self.value(DeployField::Env).split(';') {
            if let Some((key, value)) = parse_env_entry(entry)? {
                env.insert(key, value);
            }
        }

        let credential = self.trimmed(DeployField::Credential);
        let draft = NewEndpoint {
            logical_name: self.trimmed(DeployField::Name),
            spec_name: self.trimmed(DeployField::Spec),
            image: self.trimmed(DeployField::Image),
            replicas: self.parse(DeployField::Replicas)?,
            min_replicas: self.parse(DeployField::MinReplicas)?,
            max_replicas: self.parse(DeployField::MaxReplicas)?,
            task_timeout,
            env,
            registry_credential_name: (!credential.is_empty()).then_some(credential),
        };
        draft.validate()?;
        Ok(draft)
    }
}

/// Lowercase spec name with a minute stamp, e.g. `gpu-a100-40gb-05141230`.
fn default_name(spec_name: &str) -> String {
    let base: String = spec_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let base = base.trim_matches('-');
    let stamp = chrono::Local::now().format("%m%d%H%M");
    if base.is_empty() {
        format!("endpoint-{}", stamp)
    } else {
        format!("{}-{}", base, stamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::widgets::FormAction;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    fn form() -> DeployForm {
        DeployForm::for_spec(&Spec {
            spec_name: "GPU-A100-40GB".to_string(),
            ..Default::default()
        })
    }

    fn type_text(form: &mut DeployForm, text: &str) {
        for c in text.chars() {
            form.handle_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[test]
    fn test_default_name_is_valid() {
        let name = default_name("GPU-A100 40GB");
        assert!(name.starts_with("gpu-a100-40gb-"));
        assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
        assert!(default_name("***").starts_with("endpoint-"));
    }

    #[test]
    fn test_draft_from_form() {
        let mut form = form();
        assert_eq!(form.focused(), Some(DeployField::Name));
        // image is required
        assert!(form.draft().is_err());

        form.down();
        assert_eq!(form.focused(), Some(DeployField::Image));
        type_text(&mut form, "registry/flux:1");

        form.focus(DeployField::Env);
        type_text(&mut form, "MODEL=flux; HF_TOKEN=abc=def");

        let draft = form.draft().unwrap();
        assert_eq!(draft.spec_name, "GPU-A100-40GB");
        assert_eq!(draft.image, "registry/flux:1");
        assert_eq!((draft.replicas, draft.min_replicas, draft.max_replicas), (1, 0, 3));
        assert_eq!(draft.task_timeout, 3600);
        assert_eq!(draft.env.get("HF_TOKEN").map(String::as_str), Some("abc=def"));
        assert_eq!(draft.env.len(), 2);
        assert_eq!(draft.registry_credential_name, None);

        form.down();
        assert!(form.is_last());
        type_text(&mut form, "ghcr-main");
        assert_eq!(form.draft().unwrap().registry_credential_name.as_deref(), Some("ghcr-main"));
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        assert_eq!(form.handle_key(enter), FormAction::Submit);
    }

    #[test]
    fn test_draft_rejects_bad_numbers() {
        let mut form = form();
        form.focus(DeployField::Image);
        type_text(&mut form, "img");
        form.focus(DeployField::MaxReplicas);
        type_text(&mut form, "x");
        assert_eq!(form.draft().unwrap_err(), "Max replicas must be a number");

        form.up();
        assert_eq!(form.focused(), Some(DeployField::MinReplicas));
    }
}
