use serde::{Deserialize, Serialize};

/// Version of the persisted record shape. Bumped whenever a field changes meaning.
pub const SCHEMA_VERSION: u32 = 1;

/// Package (in LPA) at which a visit counts as Group I.
pub const GROUP_ONE_THRESHOLD_LPA: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    #[serde(rename = "CE")]
    Ce,
    #[serde(rename = "IT")]
    It,
    #[serde(rename = "E&TC")]
    Entc,
}

impl Branch {
    pub const ALL: [Branch; 3] = [Branch::Ce, Branch::It, Branch::Entc];

    pub fn code(self) -> &'static str {
        match self {
            Branch::Ce => "CE",
            Branch::It => "IT",
            Branch::Entc => "E&TC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Group I")]
    GroupI,
    #[serde(rename = "Group II")]
    GroupII,
}

impl Category {
    pub fn for_salary(salary_lpa: f64) -> Self {
        if salary_lpa >= GROUP_ONE_THRESHOLD_LPA {
            Category::GroupI
        } else {
            Category::GroupII
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::GroupI => "Group I",
            Category::GroupII => "Group II",
        }
    }
}

/// Fields the column mapper can fill from a cell. Used to flag values that were defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    MinCgpa,
    SelectionsCe,
    SelectionsIt,
    SelectionsEntc,
    GenderMale,
    GenderFemale,
    GenderTotal,
    SalaryLpa,
    TotalSalaryLpa,
}

impl RecordField {
    pub fn name(self) -> &'static str {
        match self {
            RecordField::MinCgpa => "criteria.min_cgpa",
            RecordField::SelectionsCe => "selections.CE",
            RecordField::SelectionsIt => "selections.IT",
            RecordField::SelectionsEntc => "selections.E&TC",
            RecordField::GenderMale => "gender_distribution.male",
            RecordField::GenderFemale => "gender_distribution.female",
            RecordField::GenderTotal => "gender_distribution.total",
            RecordField::SalaryLpa => "salary_lpa",
            RecordField::TotalSalaryLpa => "total_salary_lpa",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criteria {
    pub min_cgpa: f64,
    pub eligible_branches: Vec<Branch>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections {
    #[serde(rename = "CE")]
    pub ce: u32,
    #[serde(rename = "IT")]
    pub it: u32,
    #[serde(rename = "E&TC")]
    pub entc: u32,
}

impl Selections {
    pub fn total(&self) -> u64 {
        u64::from(self.ce) + u64::from(self.it) + u64::from(self.entc)
    }

    pub fn get(&self, branch: Branch) -> u32 {
        match branch {
            Branch::Ce => self.ce,
            Branch::It => self.it,
            Branch::Entc => self.entc,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderDistribution {
    pub male: u32,
    pub female: u32,
    pub total: u32,
}

impl GenderDistribution {
    /// `total` is observed independently of the split; this only reports whether they agree.
    pub fn is_consistent(&self) -> bool {
        u64::from(self.male) + u64::from(self.female) == u64::from(self.total)
    }
}

/// One company visit in one academic year.
///
/// Built only by [`crate::builder::build_record`]; `id` and `category` are derived there and
/// have no setters. Deserializing derives them again from the
/// stored fields, so a stored `id` or `category` is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRecord")]
pub struct PlacementRecord {
    id: String,
    pub academic_year: String,
    pub company_name: String,
    category: Category,
    pub salary_lpa: f64,
    pub criteria: Criteria,
    pub selections: Selections,
    pub gender_distribution: GenderDistribution,
    pub total_salary_lpa: f64,
    pub schema_version: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub defaulted_fields: Vec<RecordField>,
}

/// Persisted shape of a record without its derived fields.
#[derive(Debug, Deserialize)]
struct StoredRecord {
    academic_year: String,
    company_name: String,
    salary_lpa: f64,
    criteria: Criteria,
    selections: Selections,
    gender_distribution: GenderDistribution,
    total_salary_lpa: f64,
    #[serde(default = "default_schema_version")]
    schema_version: u32,
    #[serde(default)]
    defaulted_fields: Vec<RecordField>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl From<StoredRecord> for PlacementRecord {
    fn from(stored: StoredRecord) -> Self {
        let mut record = PlacementRecord::assemble(
            stored.academic_year,
            stored.company_name,
            stored.salary_lpa,
            stored.criteria,
            stored.selections,
            stored.gender_distribution,
            stored.total_salary_lpa,
            stored.defaulted_fields,
        );
        record.schema_version = stored.schema_version;
        record
    }
}

impl PlacementRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        academic_year: String,
        company_name: String,
        salary_lpa: f64,
        criteria: Criteria,
        selections: Selections,
        gender_distribution: GenderDistribution,
        total_salary_lpa: f64,
        defaulted_fields: Vec<RecordField>,
    ) -> Self {
        Self {
            id: record_id(&academic_year, &company_name),
            category: Category::for_salary(salary_lpa),
            academic_year,
            company_name,
            salary_lpa,
            criteria,
            selections,
            gender_distribution,
            total_salary_lpa,
            schema_version: SCHEMA_VERSION,
            defaulted_fields,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn hires(&self) -> u64 {
        self.selections.total()
    }

    pub fn is_defaulted(&self, field: RecordField) -> bool {
        self.defaulted_fields.contains(&field)
    }
}

pub fn record_id(academic_year: &str, company_name: &str) -> String {
    format!("{academic_year}_{company_name}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCompany {
    pub company: String,
    pub total_selected: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyStats {
    pub year: String,
    pub total_placed: u64,
    pub highest_package: f64,
    pub avg_package: f64,
    pub median_package: f64,
    pub dept_distribution: [u64; 3],
    pub top_companies: Vec<TopCompany>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub company: String,
    pub total_hires: u64,
    pub visit_count: usize,
    pub years: Vec<String>,
    pub max_salary: f64,
    pub min_cgpa: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyVisit {
    pub year: String,
    pub salary_lpa: f64,
    pub hires: u64,
    pub dept_breakdown: Selections,
    pub criteria: Criteria,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyDetail {
    pub name: String,
    pub total_hires: u64,
    pub visit_count: usize,
    pub history: Vec<CompanyVisit>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderDivergence {
    pub id: String,
    pub male: u32,
    pub female: u32,
    pub total: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_id_and_category_are_derived_again() {
        let stored = json!({
            "_id": "1999-00_Someone Else",
            "id": "1999-00_Someone Else",
            "academic_year": "2023-24",
            "company_name": "Barclays",
            "category": "Group II",
            "salary_lpa": 12.0,
            "criteria": { "min_cgpa": 7.0, "eligible_branches": ["CE", "IT"] },
            "selections": { "CE": 6, "IT": 5, "E&TC": 0 },
            "gender_distribution": { "male": 8, "female": 3, "total": 11 },
            "total_salary_lpa": 132.0
        });

        let record: PlacementRecord = serde_json::from_value(stored).unwrap();

        assert_eq!(record.id(), "2023-24_Barclays");
        assert_eq!(record.category(), Category::GroupI);
        assert_eq!(record.schema_version, SCHEMA_VERSION);
        assert!(record.defaulted_fields.is_empty());
    }

    #[test]
    fn serialized_records_read_back_unchanged() {
        let record = PlacementRecord::assemble(
            "2022-23".to_string(),
            "Infosys".to_string(),
            3.6,
            Criteria {
                min_cgpa: 6.0,
                eligible_branches: Branch::ALL.to_vec(),
            },
            Selections { ce: 2, it: 1, entc: 1 },
            GenderDistribution { male: 3, female: 1, total: 4 },
            14.4,
            vec![RecordField::MinCgpa],
        );

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["category"], "Group II");
        let back: PlacementRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
