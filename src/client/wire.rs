//! JSON bodies of the TeamCity REST API and the parameter type codec.
//!
//! Typed parameters carry their spec as a TeamCity "raw value" such as
//! `password display='hidden' label='Deploy token'`: a type keyword followed
//! by `key='value'` pairs, with `|` as the escape character inside values.

use serde::{Deserialize, Serialize};

use super::{AgentPool, NewProject, Project, ProjectRef};
use crate::parameter::{Parameter, ParameterDisplay, ParameterSpec, ParameterType, Parameters};
use crate::validation::ROOT_PROJECT_ID;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectDto {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parent_project_id: Option<String>,
    #[serde(default)]
    pub parameters: Option<PropertiesDto>,
}

impl From<ProjectDto> for Project {
    fn from(dto: ProjectDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            description: dto.description.unwrap_or_default(),
            parent_project_id: dto
                .parent_project_id
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ROOT_PROJECT_ID.to_string()),
            parameters: dto.parameters.map(Parameters::from).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewProjectDto {
    pub name: String,
    pub parent_project: LocatorDto,
}

impl From<&NewProject> for NewProjectDto {
    fn from(project: &NewProject) -> Self {
        Self {
            name: project.name.clone(),
            parent_project: LocatorDto {
                locator: format!("id:{}", project.parent_project_id),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LocatorDto {
    pub locator: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct PropertiesDto {
    #[serde(default)]
    pub property: Vec<PropertyDto>,
}

impl From<PropertiesDto> for Parameters {
    fn from(dto: PropertiesDto) -> Self {
        dto.property
            .into_iter()
            .map(|p| {
                let spec = p.kind.and_then(|t| parse_raw_spec(&t.raw_value));
                (p.name, Parameter { value: p.value, spec })
            })
            .collect()
    }
}

impl From<&Parameters> for PropertiesDto {
    fn from(parameters: &Parameters) -> Self {
        Self {
            property: parameters
                .iter()
                .map(|(name, parameter)| PropertyDto::new(name, parameter))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PropertyDto {
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TypeDto>,
}

impl PropertyDto {
    pub fn new(name: &str, parameter: &Parameter) -> Self {
        Self {
            name: name.to_string(),
            value: parameter.value.clone(),
            kind: parameter.spec.as_ref().map(|spec| TypeDto {
                raw_value: render_raw_spec(spec),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TypeDto {
    pub raw_value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AgentPoolDto {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub projects: Option<ProjectRefsDto>,
}

impl From<AgentPoolDto> for AgentPool {
    fn from(dto: AgentPoolDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            projects: dto
                .projects
                .map(|p| p.project)
                .unwrap_or_default()
                .into_iter()
                .map(|p| {
                    (
                        p.id.clone(),
                        ProjectRef {
                            id: p.id,
                            name: p.name,
                        },
                    )
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ProjectRefsDto {
    #[serde(default)]
    pub project: Vec<ProjectRefDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProjectRefDto {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Render a spec as a TeamCity raw value.
pub fn render_raw_spec(spec: &ParameterSpec) -> String {
    let mut raw = spec.kind.as_str().to_string();
    let mut push = |key: &str, value: &str| {
        raw.push(' ');
        raw.push_str(key);
        raw.push_str("='");
        raw.push_str(&escape(value));
        raw.push('\'');
    };

    if let Some(label) = &spec.label {
        push("label", label);
    }
    if let Some(description) = &spec.description {
        push("description", description);
    }
    if spec.display != ParameterDisplay::Normal {
        push("display", spec.display.as_str());
    }
    if spec.read_only {
        push("readOnly", "true");
    }
    for (key, value) in &spec.options {
        push(key, value);
    }
    raw
}

/// Parse a TeamCity raw value; `None` only for an empty one.
///
/// Type keywords and keys this crate has no field for are kept (as
/// [`ParameterType::Other`] and in `options`) so rendering the spec again
/// reproduces what the server holds.
pub fn parse_raw_spec(raw: &str) -> Option<ParameterSpec> {
    let raw = raw.trim();
    let (keyword, mut rest) = match raw.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest),
        None => (raw, ""),
    };
    if keyword.is_empty() {
        return None;
    }

    let mut spec = ParameterSpec::new(ParameterType::from_keyword(keyword));
    while let Some((key, value, remaining)) = next_pair(rest) {
        match key {
            "label" => spec.label = Some(value),
            "description" => spec.description = Some(value),
            "display" => spec.display = ParameterDisplay::parse(&value).unwrap_or_default(),
            "readOnly" => spec.read_only = value == "true",
            _ => {
                spec.options.insert(key.to_string(), value);
            }
        }
        rest = remaining;
    }
    Some(spec)
}

/// Split `key='value' rest` into its parts, unescaping the value.
fn next_pair(input: &str) -> Option<(&str, String, &str)> {
    let input = input.trim_start();
    let (key, after_key) = input.split_once("='")?;

    let mut value = String::new();
    let mut chars = after_key.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '|' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, escaped)) => value.push(escaped),
                None => break,
            },
            '\'' => return Some((key.trim(), value, &after_key[i + 1..])),
            other => value.push(other),
        }
    }
    // unterminated value
    Some((key.trim(), value, ""))
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '|' => escaped.push_str("||"),
            '\'' => escaped.push_str("|'"),
            '[' => escaped.push_str("|["),
            ']' => escaped.push_str("|]"),
            '\n' => escaped.push_str("|n"),
            '\r' => escaped.push_str("|r"),
            other => escaped.push(other),
        }
    }
    escaped
}
