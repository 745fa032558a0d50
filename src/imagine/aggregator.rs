use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSlot {
    pub ordinal: usize,
    pub progress: Option<f64>,
    pub final_url: Option<String>,
}

/// Per-call bookkeeping for the images seen on one socket.
///
/// Ordinals follow first appearance and are never reused. Final URLs are
/// first-writer-wins per image id and kept in the order they were recorded.
#[derive(Debug)]
pub struct ResultAggregator {
    target_count: usize,
    slots: HashMap<String, ImageSlot>,
    completed: Vec<String>,
}

impl ResultAggregator {
    pub fn new(target_count: usize) -> Self {
        Self {
            target_count: target_count.max(1),
            slots: HashMap::new(),
            completed: Vec::new(),
        }
    }

    /// Resolve the image id for an event, minting `image-<n>` when the event
    /// has none, and return it with its ordinal.
    pub fn slot_for(&mut self, image_id: Option<&str>) -> (String, usize) {
        let id = match image_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("image-{}", self.slots.len()),
        };
        let next = self.slots.len();
        let slot = self.slots.entry(id.clone()).or_insert_with(|| ImageSlot {
            ordinal: next,
            progress: None,
            final_url: None,
        });
        (id, slot.ordinal)
    }

    pub fn update_progress(&mut self, image_id: &str, progress: f64) {
        if let Some(slot) = self.slots.get_mut(image_id) {
            slot.progress = Some(progress);
        }
    }

    /// Record a final URL. Returns true once the target count is reached.
    pub fn record(&mut self, image_id: &str, url: &str) -> bool {
        if self.is_satisfied() {
            return true;
        }
        if let Some(slot) = self.slots.get_mut(image_id) {
            if slot.final_url.is_none() {
                slot.final_url = Some(url.to_string());
                self.completed.push(url.to_string());
            }
        }
        self.is_satisfied()
    }

    pub fn is_satisfied(&self) -> bool {
        self.completed.len() >= self.target_count
    }

    pub fn seen(&self) -> usize {
        self.slots.len()
    }

    pub fn slot(&self, image_id: &str) -> Option<&ImageSlot> {
        self.slots.get(image_id)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn into_urls(self) -> Vec<String> {
        self.completed
    }
}
