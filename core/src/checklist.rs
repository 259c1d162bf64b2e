use crate::plan::PlanStep;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChecklistItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub completed: bool,
}

/// Setup steps shown to the user, positionally paired with the command list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checklist {
    items: Vec<ChecklistItem>,
}

impl Checklist {
    pub fn from_steps(steps: &[PlanStep]) -> Self {
        let items = steps
            .iter()
            .enumerate()
            .map(|(index, step)| ChecklistItem {
                id: format!("step-{}", index + 1),
                title: step.title.clone(),
                description: step.description.clone(),
                completed: false,
            })
            .collect();
        Self { items }
    }

    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&ChecklistItem> {
        self.items.get(index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Manual override used while reviewing a plan. Returns `false` for unknown ids.
    pub fn toggle(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|item| item.id == id) {
            Some(item) => {
                item.completed = !item.completed;
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_completed(&mut self, index: usize) {
        if let Some(item) = self.items.get_mut(index) {
            item.completed = true;
        }
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|item| item.completed).count()
    }

    pub fn completion_percent(&self) -> u8 {
        if self.items.is_empty() {
            return 0;
        }
        (self.completed_count() * 100 / self.items.len()) as u8
    }
}
