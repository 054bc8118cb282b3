//! Inline keyboards and their callback data.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::database::{
    FormatTemplate, MediaType, MetadataField, RenameMode, UserRecord, UserSettings,
};

fn button(text: impl Into<String>, data: impl Into<String>) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(text, data)
}

fn check(on: bool) -> &'static str {
    if on { "✅ " } else { "" }
}

fn back(target: &str) -> Vec<InlineKeyboardButton> {
    vec![button("« Back", format!("menu:{target}"))]
}

/// Main menu. Admins get an extra row for the admin panel.
pub fn main_menu(authorized: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![
        vec![button("⚙️ Settings", "menu:settings"), button("📊 My Stats", "menu:stats")],
        vec![button("📝 Format", "menu:format"), button("🖼 Thumbnail", "menu:thumb")],
        vec![button("🏷 Metadata", "menu:meta"), button("🏆 Leaderboard", "menu:leaderboard")],
        vec![button("❓ Help", "menu:help"), button("✖ Close", "menu:close")],
    ];
    if authorized {
        rows.push(vec![button("🛠 Admin Panel", "admin:stats")]);
    }
    InlineKeyboardMarkup::new(rows)
}

pub fn back_to_main() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![back("main")])
}

pub fn settings_menu(settings: &UserSettings) -> InlineKeyboardMarkup {
    let thumb = if settings.auto_thumbnail { "ON" } else { "OFF" };
    let mut rows = mode_rows(settings.rename_mode);
    rows.extend(media_type_rows(settings.media_type));
    rows.push(vec![button(format!("🖼 Auto thumbnail: {thumb}"), "set:thumb_toggle")]);
    rows.push(back("main"));
    InlineKeyboardMarkup::new(rows)
}

fn mode_rows(mode: RenameMode) -> Vec<Vec<InlineKeyboardButton>> {
    vec![vec![
        button(format!("{}🤖 Auto", check(mode == RenameMode::Auto)), "mode:auto"),
        button(format!("{}✍️ Manual", check(mode == RenameMode::Manual)), "mode:manual"),
    ]]
}

fn media_type_rows(media_type: MediaType) -> Vec<Vec<InlineKeyboardButton>> {
    vec![vec![
        button(format!("{}📄 Document", check(media_type == MediaType::Document)), "type:document"),
        button(format!("{}🎬 Video", check(media_type == MediaType::Video)), "type:video"),
    ]]
}

pub fn mode_menu(mode: RenameMode) -> InlineKeyboardMarkup {
    let mut rows = mode_rows(mode);
    rows.push(back("settings"));
    InlineKeyboardMarkup::new(rows)
}

pub fn media_type_menu(media_type: MediaType) -> InlineKeyboardMarkup {
    let mut rows = media_type_rows(media_type);
    rows.push(back("settings"));
    InlineKeyboardMarkup::new(rows)
}

pub fn format_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("✏️ Custom", "fmt:custom"), button("♻️ Reset", "fmt:reset")],
        vec![button("📚 Saved templates", "fmt:list")],
        back("main"),
    ])
}

/// One row per saved template: activate and delete.
pub fn templates_menu(templates: &[FormatTemplate]) -> InlineKeyboardMarkup {
    let mut rows: Vec<_> = templates
        .iter()
        .map(|t| {
            vec![
                button(format!("▶️ {}", t.name), format!("fmt:use:{}", t.id)),
                button("🗑", format!("fmt:del:{}", t.id)),
            ]
        })
        .collect();
    rows.push(back("format"));
    InlineKeyboardMarkup::new(rows)
}

pub fn thumbnail_menu(has_custom: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![button("📤 Set custom", "thumb:custom")]];
    if has_custom {
        rows.push(vec![button("👁 View", "thumb:view"), button("🗑 Delete", "thumb:delete")]);
    }
    rows.push(back("main"));
    InlineKeyboardMarkup::new(rows)
}

pub fn metadata_menu(settings: &UserSettings) -> InlineKeyboardMarkup {
    let toggle = if settings.metadata_enabled {
        button("🔴 Turn off", "meta:off")
    } else {
        button("🟢 Turn on", "meta:on")
    };

    let mut rows = vec![vec![toggle]];
    for pair in MetadataField::ALL.chunks(2) {
        rows.push(
            pair.iter()
                .map(|f| button(format!("✏️ {}", f.label()), format!("meta:edit:{}", f.key())))
                .collect(),
        );
    }
    rows.push(back("main"));
    InlineKeyboardMarkup::new(rows)
}

/// Shown after a file arrives in manual mode.
pub fn manual_prompt() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        button("🤖 Use template", "file:auto"),
        button("✖ Cancel", "file:cancel"),
    ]])
}

/// Attached to job status messages.
pub fn job_cancel() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![button("✖ Cancel", "job:cancel")]])
}

pub fn admin_panel() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("📊 Stats", "admin:stats"), button("📦 Dump channels", "admin:dumps")],
        vec![button("👥 Users", "admin:users"), button("📢 Broadcast", "admin:broadcast")],
        back("main"),
    ])
}

/// One row per user with ban and admin toggles. Owners get no buttons.
pub fn user_management(users: &[UserRecord], owners: &[u64]) -> InlineKeyboardMarkup {
    let mut rows: Vec<_> = users
        .iter()
        .filter(|user| !owners.contains(&user.user_id))
        .map(|user| {
            let id = user.user_id;
            let ban = if user.is_banned {
                button(format!("✅ Unban {id}"), format!("admin:unban:{id}"))
            } else {
                button(format!("🚫 Ban {id}"), format!("admin:ban:{id}"))
            };
            let role = if user.is_admin {
                button("⬇️ Demote", format!("admin:demote:{id}"))
            } else {
                button("🛡 Promote", format!("admin:promote:{id}"))
            };
            vec![ban, role]
        })
        .collect();
    rows.push(vec![button("🔄 Refresh", "admin:users"), button("« Back", "admin:stats")]);
    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::InlineKeyboardButtonKind;

    fn callback_data(markup: &InlineKeyboardMarkup) -> Vec<String> {
        markup
            .inline_keyboard
            .iter()
            .flatten()
            .filter_map(|b| match &b.kind {
                InlineKeyboardButtonKind::CallbackData(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_admin_row_only_for_authorized() {
        assert!(!callback_data(&main_menu(false)).contains(&"admin:stats".to_string()));
        assert!(callback_data(&main_menu(true)).contains(&"admin:stats".to_string()));
    }

    #[test]
    fn test_metadata_menu_lists_every_field() {
        let settings = UserSettings::new(1, "{title}");
        let data = callback_data(&metadata_menu(&settings));
        assert_eq!(data[0], "meta:on");
        for field in MetadataField::ALL {
            assert!(data.contains(&format!("meta:edit:{}", field.key())));
        }
    }

    #[test]
    fn test_templates_menu_uses_ids() {
        let template = FormatTemplate {
            id: 12,
            user_id: 1,
            name: "movies".into(),
            template: "{title} ({year})".into(),
            variables: vec!["title".into(), "year".into()],
            created_at: 0,
        };
        let data = callback_data(&templates_menu(&[template]));
        assert_eq!(data, vec!["fmt:use:12", "fmt:del:12", "menu:format"]);
    }

    fn user(id: u64, banned: bool, admin: bool) -> UserRecord {
        UserRecord {
            user_id: id,
            username: None,
            first_name: "User".into(),
            last_name: None,
            is_banned: banned,
            is_admin: admin,
            joined_at: 0,
            last_active: 0,
            files_renamed: 0,
            total_size: 0,
        }
    }

    #[test]
    fn test_user_management_toggles_follow_flags() {
        let users = [user(1, false, false), user(10, false, false), user(11, true, true)];
        let data = callback_data(&user_management(&users, &[1]));
        assert_eq!(
            data,
            vec![
                "admin:ban:10",
                "admin:promote:10",
                "admin:unban:11",
                "admin:demote:11",
                "admin:users",
                "admin:stats",
            ]
        );
    }

    #[test]
    fn test_callback_data_fits_telegram_limit() {
        let settings = UserSettings::new(1, "{title}");
        let users = [user(u64::MAX, true, true)];
        for markup in [
            main_menu(true),
            settings_menu(&settings),
            metadata_menu(&settings),
            admin_panel(),
            user_management(&users, &[]),
        ] {
            for data in callback_data(&markup) {
                assert!(data.len() <= 64, "{data}");
            }
        }
    }
}
