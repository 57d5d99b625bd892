//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use grimoire_core::{Campaign, Entity, SearchHit, World, HIGHLIGHT_END, HIGHLIGHT_START};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Check if output is in quiet mode
    pub fn is_quiet(&self) -> bool {
        matches!(self.format, OutputFormat::Quiet)
    }

    /// Check if output is in JSON mode
    pub fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    /// Print a single entity with all its details
    pub fn print_entity(&self, entity: &Entity) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", entity.id);
                println!("Type:     {}", entity.entity_type);
                println!("Name:     {}", entity.name);
                if let Some(ref desc) = entity.description {
                    println!("Description: {}", desc);
                }
                if let Some(ref secrets) = entity.secrets {
                    println!("Secrets:  {}", secrets);
                }
                if let Some(ref summary) = entity.summary {
                    println!("Summary:  {}", summary);
                }
                if let Some(date) = entity.session_date {
                    println!("Date:     {}", date.format("%Y-%m-%d"));
                }
                if let Some(duration) = entity.duration {
                    println!("Duration: {} h", duration);
                }
                if !entity.tags.is_empty() {
                    println!("Tags:     {}", entity.tags.join(", "));
                }
                println!("World:    {}", entity.world_id);
                if let Some(campaign_id) = entity.campaign_id {
                    println!("Campaign: {}", campaign_id);
                }
                println!("Created:  {}", entity.created_at.format("%Y-%m-%d %H:%M"));
                println!("Modified: {}", entity.modified_at.format("%Y-%m-%d %H:%M"));

                if let Some(ref fields) = entity.type_specific_fields {
                    let set: Vec<&str> = fields
                        .legal_field_names()
                        .iter()
                        .copied()
                        .filter(|name| fields.get(name).is_some())
                        .collect();
                    if !set.is_empty() {
                        println!();
                        for name in set {
                            if let Some(value) = fields.get(name) {
                                println!("{}: {}", name, value);
                            }
                        }
                    }
                }

                if let Some(ref content) = entity.content {
                    println!();
                    println!("{}", content);
                }
                if let Some(ref notes) = entity.notes {
                    println!();
                    println!("{}", notes);
                }

                if !entity.connections.is_empty() {
                    println!();
                    println!("── Connections ({}) ──", entity.connections.len());
                    for conn in &entity.connections {
                        println!(
                            "{} | {} | {}",
                            &conn.id.to_string()[..8],
                            conn.entity_type,
                            conn.name
                        );
                    }
                }
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(entity).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", entity.id);
            }
        }
    }

    /// Print a list of entities
    pub fn print_entities(&self, entities: &[Entity]) {
        match self.format {
            OutputFormat::Human => {
                if entities.is_empty() {
                    println!("No entities found.");
                    return;
                }
                for entity in entities {
                    let tags = if entity.tags.is_empty() {
                        String::new()
                    } else {
                        format!(" [{}]", entity.tags.join(", "))
                    };
                    println!(
                        "{} | {} | {}{}",
                        &entity.id.to_string()[..8],
                        entity.entity_type,
                        truncate(&entity.name, 40),
                        tags
                    );
                }
                println!("\n{} entity(ies)", entities.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(entities).unwrap());
            }
            OutputFormat::Quiet => {
                for entity in entities {
                    println!("{}", entity.id);
                }
            }
        }
    }

    /// Print a single world
    pub fn print_world(&self, world: &World) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:       {}", world.id);
                println!("Name:     {}", world.name);
                if let Some(ref desc) = world.description {
                    println!("Description: {}", desc);
                }
                println!("Created:  {}", world.created_at.format("%Y-%m-%d %H:%M"));
                println!("Modified: {}", world.modified_at.format("%Y-%m-%d %H:%M"));
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(world).unwrap());
            }
            OutputFormat::Quiet => {
                println!("{}", world.id);
            }
        }
    }

    /// Print a list of worlds
    pub fn print_worlds(&self, worlds: &[World]) {
        match self.format {
            OutputFormat::Human => {
                if worlds.is_empty() {
                    println!("No worlds found.");
                    return;
                }
                for world in worlds {
                    println!(
                        "{} | {}",
                        &world.id.to_string()[..8],
                        truncate(&world.name, 50)
                    );
                }
                println!("\n{} world(s)", worlds.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(worlds).unwrap());
            }
            OutputFormat::Quiet => {
                for world in worlds {
                    println!("{}", world.id);
                }
            }
        }
    }

    /// Print a list of campaigns
    pub fn print_campaigns(&self, campaigns: &[Campaign]) {
        match self.format {
            OutputFormat::Human => {
                if campaigns.is_empty() {
                    println!("No campaigns found.");
                    return;
                }
                for campaign in campaigns {
                    println!(
                        "{} | {} | world {}",
                        &campaign.id.to_string()[..8],
                        truncate(&campaign.name, 40),
                        &campaign.world_id.to_string()[..8]
                    );
                }
                println!("\n{} campaign(s)", campaigns.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(campaigns).unwrap());
            }
            OutputFormat::Quiet => {
                for campaign in campaigns {
                    println!("{}", campaign.id);
                }
            }
        }
    }

    /// Print search hits
    pub fn print_search_hits(&self, hits: &[SearchHit]) {
        match self.format {
            OutputFormat::Human => {
                if hits.is_empty() {
                    println!("No matches found.");
                    return;
                }
                for hit in hits {
                    let snippet = hit
                        .content_snippet
                        .as_deref()
                        .or(hit.name_snippet.as_deref())
                        .unwrap_or("");
                    println!(
                        "{} | {} | {} | {}",
                        &hit.id.to_string()[..8],
                        hit.entity_type,
                        truncate(&hit.name, 30),
                        truncate_line(&strip_highlight(snippet), 60)
                    );
                }
                println!("\n{} match(es)", hits.len());
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(hits).unwrap());
            }
            OutputFormat::Quiet => {
                for hit in hits {
                    println!("{}", hit.id);
                }
            }
        }
    }

    /// Print a list of tags
    pub fn print_tags(&self, tags: &[(String, i64)]) {
        match self.format {
            OutputFormat::Human => {
                if tags.is_empty() {
                    println!("No tags found.");
                    return;
                }
                for (name, count) in tags {
                    println!("{} ({})", name, count);
                }
                println!("\n{} tag(s)", tags.len());
            }
            OutputFormat::Json => {
                let json_tags: Vec<_> = tags
                    .iter()
                    .map(|(name, count)| serde_json::json!({"name": name, "count": count}))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&json_tags).unwrap());
            }
            OutputFormat::Quiet => {
                for (name, _) in tags {
                    println!("{}", name);
                }
            }
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

/// Remove snippet highlight markers for terminal display
fn strip_highlight(s: &str) -> String {
    s.replace(HIGHLIGHT_START, "").replace(HIGHLIGHT_END, "")
}

/// Truncate a string to max length, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_flags() {
        assert_eq!(OutputFormat::from_flags(false, false), OutputFormat::Human);
        assert_eq!(OutputFormat::from_flags(true, false), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flags(false, true), OutputFormat::Quiet);
        // Quiet takes precedence
        assert_eq!(OutputFormat::from_flags(true, true), OutputFormat::Quiet);
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a long string", 10), "this is...");
    }

    #[test]
    fn test_truncate_multibyte() {
        // Must cut on character boundaries, not bytes
        assert_eq!(truncate("Pétur the Wanderer of Vélheim", 10), "Pétur t...");
    }

    #[test]
    fn test_truncate_line() {
        assert_eq!(truncate_line("single line", 20), "single line");
        assert_eq!(truncate_line("line one\nline two", 20), "line one");
    }

    #[test]
    fn test_strip_highlight() {
        assert_eq!(
            strip_highlight("a <b>daring</b> sword <b>captain</b>"),
            "a daring sword captain"
        );
    }
}
