//! Prompt text sent to generation backends.

use crate::requirements::RequirementSet;
use crate::wire::Project;

/// System + user message for one backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Files shown to the backend when editing, and how much of each.
const EDIT_CONTEXT_FILES: usize = 10;
const EDIT_CONTEXT_CHARS: usize = 500;

fn platform_rules() -> &'static str {
r#"Platform Rules:
- The site is deployed as static files on Netlify; the publish directory is the project root (".").
- Serverless functions, if any, live in `netlify/functions/` and use the `exports.handler` pattern. Call them via `/.netlify/functions/<name>`.
- Always include `netlify.toml` in the project root.
- Vanilla HTML/CSS/JS is preferred. Keep markup in `index.html`, styles in `styles.css`, behaviour in `app.js`.
- `index.html` must link `styles.css` with <link rel="stylesheet" href="styles.css"> and load `app.js` with <script src="app.js" defer></script>.
- Modern, responsive design: mobile navigation, readable typography, accessible forms with labels.
- Use realistic, domain-appropriate copy. No lorem ipsum.
- No hardcoded backend URLs, no secrets, no lockfiles."#
}

fn output_format() -> &'static str {
r#"OUTPUT FORMAT (CRITICAL):
Return EXACTLY ONE JSON object, no prose and no markdown fences:

{
  "files": {
    "index.html": "BASE64_ENCODED_HTML",
    "styles.css": "BASE64_ENCODED_CSS",
    "app.js": "BASE64_ENCODED_JS",
    "netlify.toml": "BASE64_ENCODED_CONFIG"
  },
  "deploy_config": {
    "build_command": "",
    "publish_dir": ".",
    "functions_dir": "netlify/functions"
  }
}

Every file value MUST be the base64 encoding of the complete file content,
because raw HTML/CSS/JS breaks JSON string quoting.

Example: <!DOCTYPE html><html><body>Hi</body></html>
encodes to PCFET0NUWVBFIGh0bWw+PGh0bWw+PGJvZHk+SGk8L2JvZHk+PC9odG1sPg=="#
}

fn edit_rules() -> &'static str {
r#"Editing Rules:
1. You are EDITING existing code, not starting over.
2. Return every file you changed, with its complete new content.
3. Files you leave out are kept exactly as they are.
4. Make surgical changes: only modify what the request asks for.
5. Keep `netlify.toml` unless the request needs it changed."#
}

fn requirements_block(requirements: &RequirementSet) -> String {
    let json = serde_json::to_string_pretty(requirements).unwrap_or_else(|_| "{}".into());
    format!(
"USER REQUESTED THESE SPECIFIC ITEMS:
{json}

VERIFICATION CHECKLIST (complete ALL items):
{checklist}",
        checklist = requirements.checklist()
    )
}

pub fn system_prompt_create() -> String {
    format!(
r#"You are an expert web developer generating complete, deployable static websites.

{platform_rules}

{output_format}"#,
        platform_rules = platform_rules(),
        output_format = output_format()
    )
}

pub fn user_prompt_create(prompt: &str, requirements: &RequirementSet) -> String {
    format!(
r#"Generate a complete Netlify-deployable website for:

"{prompt}"

COMPLETENESS REQUIREMENTS:
You MUST include EVERY item mentioned in the request above.

{requirements}

GENERATE:
1. index.html with all requested sections
2. styles.css
3. app.js
4. netlify.toml
5. README.md with deploy instructions"#,
        requirements = requirements_block(requirements)
    )
}

pub fn system_prompt_edit(requirements: &RequirementSet) -> String {
    format!(
r#"You are an expert web developer editing a deployed static website.

{edit_rules}

{requirements}

EVERY item above MUST be present in your edited code.

{platform_rules}

{output_format}"#,
        edit_rules = edit_rules(),
        requirements = requirements_block(requirements),
        platform_rules = platform_rules(),
        output_format = output_format()
    )
}

pub fn user_prompt_edit(prompt: &str, existing: &Project) -> String {
    let mut context = String::new();
    for (path, content) in existing.files.iter().take(EDIT_CONTEXT_FILES) {
        let preview: String = content.chars().take(EDIT_CONTEXT_CHARS).collect();
        let ellipsis = if content.chars().count() > EDIT_CONTEXT_CHARS { "..." } else { "" };
        context.push_str(&format!(
            "=== {path} ({} chars) ===\n{preview}{ellipsis}\n\n",
            content.chars().count()
        ));
    }
    format!(
"Edit this project.

EDIT REQUEST:
{prompt}

CURRENT PROJECT FILES:
{context}INSTRUCTIONS:
1. Work out what the request changes.
2. Modify only the affected files.
3. Return the changed files in the JSON format above."
    )
}

/// Follow-up after a valid project came back short of the checklist.
pub fn user_prompt_emphasized(prompt: &str, requirements: &RequirementSet, missing: &[String]) -> String {
    let list = missing
        .iter()
        .map(|m| format!("  - {m}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
r#"Your previous answer for this request was incomplete:

"{prompt}"

THESE REQUIRED ITEMS WERE MISSING:
{list}

Regenerate the COMPLETE project. Keep everything that was already right and add
every missing item as visible content in index.html.

{requirements}"#,
        requirements = requirements_block(requirements)
    )
}

/// Prompt pair for a fresh site, or for an edit when `existing` has files.
pub fn for_request(prompt: &str, existing: Option<&Project>, requirements: &RequirementSet) -> PromptPair {
    match existing.filter(|p| !p.files.is_empty()) {
        Some(project) => PromptPair {
            system: system_prompt_edit(requirements),
            user: user_prompt_edit(prompt, project),
        },
        None => PromptPair {
            system: system_prompt_create(),
            user: user_prompt_create(prompt, requirements),
        },
    }
}
