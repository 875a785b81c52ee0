use serde::{Deserialize, Serialize};

/// The comparable fields of a vacancy, as supplied by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VacancyText {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub hours_per_week: Option<String>,
    #[serde(default)]
    pub salary_range: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl VacancyText {
    /// One labelled line per present field, then the description.
    pub fn comparable_text(&self) -> String {
        let labelled = [
            ("Title", Some(self.title.as_str())),
            ("Location", self.location.as_deref()),
            ("Hours", self.hours_per_week.as_deref()),
            ("Salary", self.salary_range.as_deref()),
        ];

        let mut lines: Vec<String> = labelled
            .into_iter()
            .filter_map(|(label, value)| {
                value
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(|v| format!("{label}: {v}"))
            })
            .collect();

        if let Some(description) = self.description.as_deref().map(str::trim) {
            if !description.is_empty() {
                lines.push(description.to_string());
            }
        }

        lines.join("\n")
    }

    /// The present field values without labels, for keyword matching.
    pub fn keyword_text(&self) -> String {
        [
            Some(self.title.as_str()),
            self.location.as_deref(),
            self.hours_per_week.as_deref(),
            self.salary_range.as_deref(),
            self.description.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
    }
}
