use crate::config::Config;
use crate::events::AppWindowEntry;
use std::collections::HashSet;
use std::io::Write;
use tracing::{info, warn};

pub const PAYLOAD_HEADER: &str = "# set_window_frames payload example:";

/// Последний опубликованный снимок окон.
///
/// Принадлежит последовательному исполнителю; каждая публикация целиком
/// заменяет предыдущий список.
#[derive(Debug, Default)]
pub struct WindowFramesStore {
    entries: Vec<AppWindowEntry>,
    generation: u64,
}

impl WindowFramesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, entries: Vec<AppWindowEntry>) {
        self.entries = entries;
        self.generation += 1;
    }

    pub fn entries(&self) -> &[AppWindowEntry] {
        &self.entries
    }

    /// Сколько раз список публиковался
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Текст примера payload для set_window_frames.
///
/// Одинаковые строки выводятся один раз в порядке первого появления;
/// скрытые идентификаторы пропускаются. Исходный список не меняется.
pub fn render_payload(entries: &[AppWindowEntry], hidden: &HashSet<String>) -> String {
    let mut seen: HashSet<String> = HashSet::new();
    let items: Vec<String> = entries
        .iter()
        .filter(|entry| !hidden.contains(&entry.application_identifier))
        .map(|entry| {
            let f = &entry.frame;
            format!(
                "  {{ \"bundle_identifier\": \"{}\", \"x\": {:.0}, \"y\": {:.0}, \"width\": {:.0}, \"height\": {:.0} }}",
                entry.application_identifier, f.x, f.y, f.width, f.height
            )
        })
        .filter(|item| seen.insert(item.clone()))
        .collect();

    let mut lines = Vec::with_capacity(items.len() + 3);
    lines.push(PAYLOAD_HEADER.to_string());
    lines.push("[".to_string());
    let last = items.len().saturating_sub(1);
    for (index, item) in items.into_iter().enumerate() {
        let comma = if index == last { "" } else { "," };
        lines.push(format!("{}{}", item, comma));
    }
    lines.push("]".to_string());
    lines.join("\n")
}

/// Поверхность, на которой показывается снимок окон
pub trait Presenter: Send + Sync {
    fn present(&mut self, store: &WindowFramesStore);

    /// Показать поверхность поверх остальных
    fn raise(&mut self);
}

pub struct LogPresenter {
    hidden: HashSet<String>,
}

impl LogPresenter {
    pub fn new(hidden: HashSet<String>) -> Self {
        Self { hidden }
    }
}

impl Presenter for LogPresenter {
    fn present(&mut self, store: &WindowFramesStore) {
        info!(
            "Снимок окон #{} ({} записей):\n{}",
            store.generation(),
            store.entries().len(),
            render_payload(store.entries(), &self.hidden)
        );
    }

    fn raise(&mut self) {}
}

pub struct StdoutPresenter {
    hidden: HashSet<String>,
}

impl StdoutPresenter {
    pub fn new(hidden: HashSet<String>) -> Self {
        Self { hidden }
    }
}

impl Presenter for StdoutPresenter {
    fn present(&mut self, store: &WindowFramesStore) {
        let payload = render_payload(store.entries(), &self.hidden);
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{}", payload).and_then(|_| stdout.flush()) {
            warn!("Не удалось вывести снимок окон: {}", e);
        }
    }

    fn raise(&mut self) {}
}

/// Factory function to create the presenter selected in config
pub fn create_presenter(config: &Config) -> Box<dyn Presenter> {
    let hidden = config.hidden_identifiers().clone();
    match config.presentation.output.as_str() {
        "stdout" => Box::new(StdoutPresenter::new(hidden)),
        _ => Box::new(LogPresenter::new(hidden)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Rect;

    fn hidden() -> HashSet<String> {
        ["com.apple.controlcenter".to_string()].into_iter().collect()
    }

    #[test]
    fn test_identical_entries_render_once() {
        let frame = Rect::new(10.0, 20.0, 300.0, 200.0);
        let entries = vec![
            AppWindowEntry::new("com.a", frame),
            AppWindowEntry::new("com.a", frame),
            AppWindowEntry::new("com.b", Rect::new(40.0, 60.0, 640.0, 480.0)),
        ];

        let payload = render_payload(&entries, &hidden());
        assert_eq!(
            payload,
            "# set_window_frames payload example:\n\
             [\n\
             \x20 { \"bundle_identifier\": \"com.a\", \"x\": 10, \"y\": 20, \"width\": 300, \"height\": 200 },\n\
             \x20 { \"bundle_identifier\": \"com.b\", \"x\": 40, \"y\": 60, \"width\": 640, \"height\": 480 }\n\
             ]"
        );
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_hidden_identifiers_and_empty_list() {
        let entries = vec![AppWindowEntry::new(
            "com.apple.controlcenter",
            Rect::new(0.0, 0.0, 30.0, 24.0),
        )];
        assert_eq!(
            render_payload(&entries, &hidden()),
            "# set_window_frames payload example:\n[\n]"
        );
    }

    #[test]
    fn test_store_replaces_entries() {
        let mut store = WindowFramesStore::new();
        store.replace(vec![AppWindowEntry::new("com.a", Rect::new(0.0, 0.0, 1.0, 1.0))]);
        store.replace(vec![AppWindowEntry::new("com.b", Rect::new(0.0, 0.0, 1.0, 1.0))]);
        assert_eq!(store.entries().len(), 1);
        assert_eq!(store.entries()[0].application_identifier, "com.b");
        assert_eq!(store.generation(), 2);
    }
}
