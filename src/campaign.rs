//! Campaign definitions and customer-id list output

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::RfmError;
use crate::model::RfmTable;
use crate::segment::Segment;

/// A target cohort: customers in any listed segment who bought any listed category
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Campaign {
    pub name: String,
    pub segments: Vec<Segment>,
    pub categories: Vec<String>,
    /// File name of the id list, relative to the output directory
    pub output: String,
}

impl Campaign {
    pub fn select(&self, table: &RfmTable) -> Vec<String> {
        table.filter_segment(&self.segments, &self.categories)
    }
}

/// Campaign file layout
///
/// The built-in defaults use English category labels (`WOMEN`, `MEN`, `KIDS`).
/// The FLO export labels categories in Turkish (`KADIN`, `ERKEK`, `ÇOCUK`),
/// so run it with `--config config/flo_campaigns.yaml`. Otherwise both lists
/// come out empty. Segment names are matched case-insensitively.
///
/// ```yaml
/// reference_date: 2021-06-01
/// campaigns:
///   - name: new_womens_brand
///     segments: [champions, loyal_customers]
///     categories: [WOMEN]
///     output: champion_and_loyal_customers_in_women_categories.csv
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CampaignConfig {
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
    pub campaigns: Vec<Campaign>,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            reference_date: None,
            campaigns: vec![
                Campaign {
                    name: "new_womens_brand".to_string(),
                    segments: vec![Segment::Champions, Segment::LoyalCustomers],
                    categories: vec!["WOMEN".to_string()],
                    output: "champion_and_loyal_customers_in_women_categories.csv".to_string(),
                },
                Campaign {
                    name: "mens_and_kids_discount".to_string(),
                    segments: vec![
                        Segment::CantLoose,
                        Segment::AboutToSleep,
                        Segment::NewCustomers,
                    ],
                    categories: vec!["MEN".to_string(), "KIDS".to_string()],
                    output: "discount_customers.csv".to_string(),
                },
            ],
        }
    }
}

impl CampaignConfig {
    pub fn from_yaml_str(text: &str) -> crate::Result<Self> {
        let config: CampaignConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml_str(&text)?;
        info!(
            path = %path.as_ref().display(),
            campaigns = config.campaigns.len(),
            "loaded campaign config"
        );
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.campaigns.is_empty() {
            return Err(RfmError::InvalidConfig("no campaigns defined".to_string()));
        }

        let mut names = HashSet::new();
        let mut outputs = HashSet::new();
        for campaign in &self.campaigns {
            if campaign.segments.is_empty() {
                return Err(RfmError::InvalidConfig(format!(
                    "campaign '{}' lists no segments",
                    campaign.name
                )));
            }
            if campaign.categories.iter().all(|c| c.trim().is_empty()) {
                return Err(RfmError::InvalidConfig(format!(
                    "campaign '{}' lists no categories",
                    campaign.name
                )));
            }
            if !names.insert(campaign.name.as_str()) {
                return Err(RfmError::InvalidConfig(format!(
                    "duplicate campaign name '{}'",
                    campaign.name
                )));
            }
            if !outputs.insert(campaign.output.as_str()) {
                return Err(RfmError::InvalidConfig(format!(
                    "campaigns share output file '{}'",
                    campaign.output
                )));
            }
        }
        Ok(())
    }
}

/// Ids selected for one campaign and where they were written
#[derive(Debug, Clone, PartialEq)]
pub struct CampaignResult {
    pub name: String,
    pub path: PathBuf,
    pub customer_ids: Vec<String>,
}

/// Write ids one per line, no header.
pub fn write_id_list<W: Write>(mut writer: W, ids: &[String]) -> crate::Result<()> {
    for id in ids {
        writeln!(writer, "{}", id)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_id_list_file<P: AsRef<Path>>(path: P, ids: &[String]) -> crate::Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_id_list(std::io::BufWriter::new(file), ids)
}

/// Select and write every campaign's cohort into `output_dir`.
pub fn run_campaigns(
    table: &RfmTable,
    campaigns: &[Campaign],
    output_dir: &Path,
) -> crate::Result<Vec<CampaignResult>> {
    campaigns
        .iter()
        .map(|campaign| -> crate::Result<CampaignResult> {
            let customer_ids = campaign.select(table);
            if customer_ids.is_empty() {
                warn!(campaign = %campaign.name, "campaign selected no customers");
            }

            let path = output_dir.join(&campaign.output);
            write_id_list_file(&path, &customer_ids)?;
            info!(
                campaign = %campaign.name,
                customers = customer_ids.len(),
                path = %path.display(),
                "wrote campaign list"
            );

            Ok(CampaignResult {
                name: campaign.name.clone(),
                path,
                customer_ids,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_campaigns() {
        let config = CampaignConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.campaigns.len(), 2);
        assert_eq!(
            config.campaigns[0].segments,
            vec![Segment::Champions, Segment::LoyalCustomers]
        );
        assert_eq!(config.campaigns[1].categories, vec!["MEN", "KIDS"]);
    }

    #[test]
    fn test_parse_yaml_config() {
        let text = "\
reference_date: 2021-07-15
campaigns:
  - name: sleepers
    segments: [hibernating, at_risk]
    categories: [AKTIFSPOR]
    output: sleepers.txt
";
        let config = CampaignConfig::from_yaml_str(text).unwrap();
        assert_eq!(config.reference_date, NaiveDate::from_ymd_opt(2021, 7, 15));
        assert_eq!(config.campaigns[0].segments, vec![Segment::Hibernating, Segment::AtRisk]);
        assert_eq!(config.campaigns[0].output, "sleepers.txt");
    }

    #[test]
    fn test_segment_names_ignore_case() {
        let text = "\
campaigns:
  - name: loyal
    segments: [Champions, LOYAL_CUSTOMERS]
    categories: [WOMEN]
    output: loyal.txt
";
        let config = CampaignConfig::from_yaml_str(text).unwrap();
        assert_eq!(
            config.campaigns[0].segments,
            vec![Segment::Champions, Segment::LoyalCustomers]
        );
    }

    #[test]
    fn test_bundled_flo_config_uses_export_labels() {
        let config =
            CampaignConfig::from_yaml_str(include_str!("../config/flo_campaigns.yaml")).unwrap();
        assert_eq!(config.reference_date, NaiveDate::from_ymd_opt(2021, 6, 1));
        assert_eq!(config.campaigns[0].categories, vec!["KADIN"]);
        assert_eq!(config.campaigns[1].categories, vec!["ERKEK", "ÇOCUK"]);
        assert_eq!(
            config.campaigns[1].segments,
            CampaignConfig::default().campaigns[1].segments
        );
    }

    #[test]
    fn test_rejects_unknown_segment_and_duplicates() {
        let unknown = "\
campaigns:
  - name: vip
    segments: [whales]
    categories: [WOMEN]
    output: vip.txt
";
        assert!(CampaignConfig::from_yaml_str(unknown).is_err());

        let duplicate = "\
campaigns:
  - name: a
    segments: [champions]
    categories: [WOMEN]
    output: same.txt
  - name: b
    segments: [promising]
    categories: [MEN]
    output: same.txt
";
        assert!(matches!(
            CampaignConfig::from_yaml_str(duplicate),
            Err(RfmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_empty_filters() {
        let text = "\
campaigns:
  - name: a
    segments: []
    categories: [WOMEN]
    output: a.txt
";
        assert!(matches!(
            CampaignConfig::from_yaml_str(text),
            Err(RfmError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_write_id_list_has_no_header() {
        let mut buffer = Vec::new();
        write_id_list(&mut buffer, &["a1".to_string(), "b2".to_string()]).unwrap();
        assert_eq!(String::from_utf8(buffer).unwrap(), "a1\nb2\n");

        let mut empty = Vec::new();
        write_id_list(&mut empty, &[]).unwrap();
        assert!(empty.is_empty());
    }
}
