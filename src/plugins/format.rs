//! Format template commands: /format, /getfmt, /savefmt, /templates,
//! /usefmt, /delfmt and the `fmt:*` callbacks.

use teloxide::prelude::*;
use tracing::info;

use super::{callback_value, keyboards, sender_id};
use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::database::{FormatTemplate, MAX_TEMPLATES_PER_USER};
use crate::session::PendingAction;
use crate::template::{self, TemplateError};
use crate::utils::{html_escape, reply_html, reply_menu, show_menu, split_first_word};

/// Longest template name.
const MAX_NAME_LEN: usize = 32;

pub fn format_guide(current: &str) -> String {
    format!(
        "<b>📝 Format template</b>\n\n\
         Current: <code>{}</code>\n\n\
         Set a new one with /format <code>template</code>, for example:\n\
         <code>/format {{title}} - {{artist}} [{{audio}}]</code>\n\
         <code>/format {{filename}} S{{season}}E{{episode}} {{resolution}}</code>\n\n\
         Unknown values are left empty. See /help for every variable.",
        html_escape(current)
    )
}

fn template_error_text(err: &TemplateError) -> String {
    format!("❌ Invalid template: {}", html_escape(&err.to_string()))
}

fn templates_text(templates: &[FormatTemplate]) -> String {
    if templates.is_empty() {
        return "📚 You have no saved templates.\n\nSave one with /savefmt <code>name template</code>."
            .to_string();
    }

    let mut text = format!(
        "<b>📚 Saved templates</b> ({}/{})\n\n",
        templates.len(),
        MAX_TEMPLATES_PER_USER
    );
    for t in templates {
        text.push_str(&format!(
            "• <b>{}</b>: <code>{}</code>\n",
            html_escape(&t.name),
            html_escape(&t.template)
        ));
    }
    text
}

fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("Template name cannot be empty.");
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err("Template name is too long (max 32 characters).");
    }
    Ok(())
}

/// Validate and activate `template`. Returns the reply text.
pub async fn set_format(state: &AppState, user_id: u64, template: &str) -> anyhow::Result<String> {
    let template = template.trim();
    if let Err(e) = template::validate(template) {
        return Ok(template_error_text(&e));
    }

    state
        .settings
        .update(user_id, |s| s.format_template = template.to_string())
        .await?;
    info!("User {} set format {:?}", user_id, template);

    Ok(format!("✅ Format updated:\n<code>{}</code>", html_escape(template)))
}

/// Validate and save a named template. Returns the reply text.
pub async fn save_template(
    state: &AppState,
    user_id: u64,
    name: &str,
    template: &str,
) -> anyhow::Result<String> {
    let (name, template) = (name.trim(), template.trim());
    if let Err(e) = validate_name(name) {
        return Ok(format!("❌ {e}"));
    }
    if let Err(e) = template::validate(template) {
        return Ok(template_error_text(&e));
    }

    let exists = state.templates.get_by_name(user_id, name).await?.is_some();
    if !exists && state.templates.count(user_id).await? >= MAX_TEMPLATES_PER_USER {
        return Ok(format!(
            "❌ You can keep at most {MAX_TEMPLATES_PER_USER} templates. Delete one with /delfmt first."
        ));
    }

    let saved = state.templates.save(user_id, name, template).await?;
    Ok(format!(
        "✅ Template <b>{}</b> saved:\n<code>{}</code>\n\nActivate it with /usefmt {}",
        html_escape(&saved.name),
        html_escape(&saved.template),
        html_escape(&saved.name)
    ))
}

/// Handle /format [template].
pub async fn format_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);

    if args.trim().is_empty() {
        let settings = state.settings.get(user_id).await?;
        reply_menu(&bot, &msg, format_guide(&settings.format_template), keyboards::format_menu())
            .await?;
        return Ok(());
    }

    let text = set_format(&state, user_id, &args).await?;
    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle /getfmt.
pub async fn getfmt_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let settings = state.settings.get(sender_id(&msg)).await?;
    reply_html(
        &bot,
        &msg,
        format!("📝 Current format:\n<code>{}</code>", html_escape(&settings.format_template)),
    )
    .await?;
    Ok(())
}

/// Handle /savefmt <name> [template]. Without a template the next text
/// message is used.
pub async fn savefmt_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);
    let (name, template) = split_first_word(&args);

    if name.is_empty() {
        reply_html(&bot, &msg, "Usage: /savefmt <code>name template</code>").await?;
        return Ok(());
    }

    if template.is_empty() {
        if let Err(e) = validate_name(name) {
            reply_html(&bot, &msg, format!("❌ {e}")).await?;
            return Ok(());
        }
        state
            .sessions
            .set(user_id, PendingAction::AwaitingTemplateSave(name.to_string()));
        reply_html(
            &bot,
            &msg,
            format!("✏️ Send the template to save as <b>{}</b>.", html_escape(name)),
        )
        .await?;
        return Ok(());
    }

    let text = save_template(&state, user_id, name, template).await?;
    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle /templates.
pub async fn templates_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    _args: String,
) -> anyhow::Result<()> {
    let templates = state.templates.list(sender_id(&msg)).await?;
    reply_menu(&bot, &msg, templates_text(&templates), keyboards::templates_menu(&templates)).await?;
    Ok(())
}

/// Handle /usefmt <name>.
pub async fn usefmt_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let user_id = sender_id(&msg);
    let name = args.trim();
    if name.is_empty() {
        reply_html(&bot, &msg, "Usage: /usefmt <code>name</code>").await?;
        return Ok(());
    }

    let text = match state.templates.get_by_name(user_id, name).await? {
        Some(t) => {
            state
                .settings
                .update(user_id, |s| s.format_template = t.template.clone())
                .await?;
            format!(
                "✅ Now using <b>{}</b>:\n<code>{}</code>",
                html_escape(&t.name),
                html_escape(&t.template)
            )
        }
        None => format!("❌ No template named <b>{}</b>.", html_escape(name)),
    };
    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle /delfmt <name>.
pub async fn delfmt_command(
    bot: ThrottledBot,
    msg: Message,
    state: AppState,
    args: String,
) -> anyhow::Result<()> {
    let name = args.trim();
    if name.is_empty() {
        reply_html(&bot, &msg, "Usage: /delfmt <code>name</code>").await?;
        return Ok(());
    }

    let text = if state.templates.delete_by_name(sender_id(&msg), name).await? {
        format!("🗑 Template <b>{}</b> deleted.", html_escape(name))
    } else {
        format!("❌ No template named <b>{}</b>.", html_escape(name))
    };
    reply_html(&bot, &msg, text).await?;
    Ok(())
}

/// Handle `fmt:*` callbacks.
pub async fn format_callback(bot: ThrottledBot, q: CallbackQuery, state: AppState) -> anyhow::Result<()> {
    let user_id = q.from.id.0;
    let value = callback_value(&q, "fmt:");
    let mut notice: Option<String> = None;

    match value {
        "custom" => {
            state.sessions.set(user_id, PendingAction::AwaitingFormat);
            show_menu(
                &bot,
                &q,
                "✏️ Send your new format template.\n\nExample: <code>{title} - {artist}</code>\nUse /clear to cancel.",
                keyboards::format_menu(),
            )
            .await?;
        }
        "reset" => {
            let default = state.settings.default_format().to_string();
            let updated = state
                .settings
                .update(user_id, |s| s.format_template = default)
                .await?;
            show_menu(&bot, &q, format_guide(&updated.format_template), keyboards::format_menu())
                .await?;
            notice = Some("Format reset".to_string());
        }
        "list" => {
            let templates = state.templates.list(user_id).await?;
            show_menu(&bot, &q, templates_text(&templates), keyboards::templates_menu(&templates))
                .await?;
        }
        other => {
            if let Some(id) = other.strip_prefix("use:").and_then(|s| s.parse::<i64>().ok()) {
                notice = Some(match state.templates.get(user_id, id).await? {
                    Some(t) => {
                        state
                            .settings
                            .update(user_id, |s| s.format_template = t.template.clone())
                            .await?;
                        format!("Now using {}", t.name)
                    }
                    None => "Template not found".to_string(),
                });
            } else if let Some(id) = other.strip_prefix("del:").and_then(|s| s.parse::<i64>().ok()) {
                let deleted = state.templates.delete(user_id, id).await?;
                let templates = state.templates.list(user_id).await?;
                show_menu(&bot, &q, templates_text(&templates), keyboards::templates_menu(&templates))
                    .await?;
                notice = Some(if deleted { "Deleted" } else { "Template not found" }.to_string());
            }
        }
    }

    let mut answer = bot.answer_callback_query(q.id);
    if let Some(text) = notice {
        answer = answer.text(text);
    }
    answer.await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_name_rules() {
        assert!(validate_name("movies").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_error_text_lists_unknown_variables() {
        let err = template::validate("{title} {bogus}").unwrap_err();
        assert_eq!(template_error_text(&err), "❌ Invalid template: unknown variables: bogus");
    }

    #[test]
    fn test_templates_text() {
        assert!(templates_text(&[]).starts_with("📚 You have no saved templates."));

        let saved = FormatTemplate {
            id: 1,
            user_id: 9,
            name: "music".into(),
            template: "{artist} - {title}".into(),
            variables: vec!["artist".into(), "title".into()],
            created_at: 0,
        };
        let text = templates_text(&[saved]);
        assert!(text.contains("(1/20)"));
        assert!(text.contains("• <b>music</b>: <code>{artist} - {title}</code>"));
    }
}
