use crate::error::ExplorerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smoke_protocol::{
    BootPayload, DetailsResponse, ProtocolError, TileCredentialTable, decode_embedded,
};

pub const MONTHS_PER_SERIES: usize = 12;
const MONTH_LABELS: [&str; MONTHS_PER_SERIES] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    EarlyNeonatal,
    LateNeonatal,
    PostNeonatal,
    Age1To4,
    Adult,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 5] = [
        Self::EarlyNeonatal,
        Self::LateNeonatal,
        Self::PostNeonatal,
        Self::Age1To4,
        Self::Adult,
    ];

    pub fn field(self) -> &'static str {
        match self {
            Self::EarlyNeonatal => "endeaths",
            Self::LateNeonatal => "lndeaths",
            Self::PostNeonatal => "pndeaths",
            Self::Age1To4 => "a14deaths",
            Self::Adult => "adultdeaths",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::EarlyNeonatal => "Early neonatal",
            Self::LateNeonatal => "Late neonatal",
            Self::PostNeonatal => "Post-neonatal",
            Self::Age1To4 => "Ages 1-4",
            Self::Adult => "Adults",
        }
    }

    fn raw(self, response: &DetailsResponse) -> Option<&str> {
        match self {
            Self::EarlyNeonatal => response.endeaths.as_deref(),
            Self::LateNeonatal => response.lndeaths.as_deref(),
            Self::PostNeonatal => response.pndeaths.as_deref(),
            Self::Age1To4 => response.a14deaths.as_deref(),
            Self::Adult => response.adultdeaths.as_deref(),
        }
    }
}

/// Lower bound, central estimate and upper bound of attributable deaths.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MortalityEstimate {
    pub lower: f64,
    pub central: f64,
    pub upper: f64,
}

impl MortalityEstimate {
    fn from_triple([lower, central, upper]: [f64; 3]) -> Self {
        Self {
            lower,
            central,
            upper,
        }
    }
}

impl std::ops::Add for MortalityEstimate {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            lower: self.lower + rhs.lower,
            central: self.central + rhs.central,
            upper: self.upper + rhs.upper,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MortalityTable {
    pub groups: Vec<(AgeGroup, MortalityEstimate)>,
}

impl MortalityTable {
    pub fn get(&self, group: AgeGroup) -> Option<MortalityEstimate> {
        self.groups
            .iter()
            .find(|(g, _)| *g == group)
            .map(|(_, estimate)| *estimate)
    }

    /// Sum over all age groups, bound by bound.
    pub fn total(&self) -> MortalityEstimate {
        self.groups
            .iter()
            .fold(MortalityEstimate::default(), |acc, (_, e)| acc + *e)
    }

    /// Range text shown under the mortality chart.
    pub fn range_label(&self) -> String {
        let total = self.total();
        format!("{:.0} - {:.0}", total.lower, total.upper)
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthlyExposure {
    pub label: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionContribution {
    pub region: String,
    pub value: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    pub fraction: f64,
}

/// Provincial breakdown; the first row of the wire table is the header.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributionTable {
    pub header: Vec<String>,
    pub rows: Vec<RegionContribution>,
}

impl ContributionTable {
    pub fn title(&self) -> String {
        match self.header.as_slice() {
            [region, value, ..] => format!("{value} by {}", region.to_lowercase()),
            _ => "Contribution from each province".to_string(),
        }
    }

    /// Slices with positive values; fractions sum to one.
    pub fn slices(&self) -> Vec<PieSlice> {
        let total: f64 = self.rows.iter().map(|r| r.value.max(0.0)).sum();
        if total <= 0.0 {
            return vec![];
        }
        self.rows
            .iter()
            .filter(|r| r.value > 0.0)
            .map(|r| PieSlice {
                label: r.region.clone(),
                value: r.value,
                fraction: r.value / total,
            })
            .collect()
    }

    fn from_rows(rows: Vec<Vec<Value>>) -> Result<Self, ProtocolError> {
        let mut rows = rows.into_iter();
        let header = match rows.next() {
            Some(header) => header
                .into_iter()
                .map(|cell| match cell {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
            None => return Ok(Self::default()),
        };
        let rows = rows
            .enumerate()
            .map(|(i, row)| match row.as_slice() {
                [Value::String(region), value, ..] => Ok(RegionContribution {
                    region: region.clone(),
                    value: number_cell("provincial", value)?,
                }),
                _ => Err(ProtocolError::shape(
                    "provincial",
                    format!("row {} is not a [region, value] pair", i + 1),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { header, rows })
    }
}

/// Normalized state of one scenario query.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub total_pm: f64,
    pub provincial: ContributionTable,
    pub timeseries: Vec<MonthlyExposure>,
    pub mortality: MortalityTable,
    pub tiles: TileCredentialTable,
}

impl ScenarioResult {
    /// Strict normalization of a `/details` response: every field is required.
    pub fn from_response(response: &DetailsResponse) -> Result<Self, ExplorerError> {
        if let Some(message) = &response.error {
            return Err(ExplorerError::malformed(format!(
                "Backend rejected the query: {message}"
            )));
        }
        let partial = PartialResult::decode(response)?;
        let total_pm = partial
            .total_pm
            .ok_or(ProtocolError::MissingField("totalPM"))?;
        let provincial = partial
            .provincial
            .ok_or(ProtocolError::MissingField("provincial"))?;
        let timeseries = partial
            .timeseries
            .ok_or(ProtocolError::MissingField("timeseries"))?;
        let mut mortality = MortalityTable::default();
        for (group, estimate) in partial.mortality {
            let estimate = estimate.ok_or(ProtocolError::MissingField(group.field()))?;
            mortality.groups.push((group, estimate));
        }
        Ok(Self {
            total_pm,
            provincial,
            timeseries,
            mortality,
            tiles: partial.tiles,
        })
    }

    /// Lenient normalization of the page-load payload: only the tile table is
    /// required, absent statistics stay empty until the first query.
    pub fn from_boot(boot: &BootPayload) -> Result<Self, ExplorerError> {
        let partial = PartialResult::decode(&boot.details)?;
        Ok(Self {
            total_pm: partial.total_pm.unwrap_or_default(),
            provincial: partial.provincial.unwrap_or_default(),
            timeseries: partial.timeseries.unwrap_or_default(),
            mortality: MortalityTable {
                groups: partial
                    .mortality
                    .into_iter()
                    .filter_map(|(g, e)| Some((g, e?)))
                    .collect(),
            },
            tiles: partial.tiles,
        })
    }

    pub fn timeseries_range(&self) -> Option<(f64, f64)> {
        self.timeseries.iter().map(|m| m.value).fold(None, |acc, v| {
            Some(match acc {
                None => (v, v),
                Some((lo, hi)) => (lo.min(v), hi.max(v)),
            })
        })
    }
}

struct PartialResult {
    total_pm: Option<f64>,
    provincial: Option<ContributionTable>,
    timeseries: Option<Vec<MonthlyExposure>>,
    mortality: Vec<(AgeGroup, Option<MortalityEstimate>)>,
    tiles: TileCredentialTable,
}

impl PartialResult {
    fn decode(response: &DetailsResponse) -> Result<Self, ProtocolError> {
        let tiles = TileCredentialTable::from_embedded(
            response.ee_map_id.as_deref(),
            response.ee_token.as_deref(),
        )?;
        let provincial = match response.provincial.as_deref() {
            Some(raw) => Some(ContributionTable::from_rows(decode_embedded(
                "provincial",
                Some(raw),
            )?)?),
            None => None,
        };
        let timeseries = match response.timeseries.as_deref() {
            Some(raw) => Some(monthly_series(decode_embedded("timeseries", Some(raw))?)?),
            None => None,
        };
        let mortality = AgeGroup::ALL
            .into_iter()
            .map(|group| {
                let estimate = match group.raw(response) {
                    Some(raw) => Some(MortalityEstimate::from_triple(decode_embedded(
                        group.field(),
                        Some(raw),
                    )?)),
                    None => None,
                };
                Ok((group, estimate))
            })
            .collect::<Result<Vec<_>, ProtocolError>>()?;
        Ok(Self {
            total_pm: response.total_pm,
            provincial,
            timeseries,
            mortality,
            tiles,
        })
    }
}

/// Accepts a bare list of twelve numbers, twelve `[label, value]` rows, or
/// either form preceded by a header row. Null values count as zero exposure.
fn monthly_series(rows: Vec<Value>) -> Result<Vec<MonthlyExposure>, ProtocolError> {
    let mut rows = rows.as_slice();
    if let Some(Value::Array(first)) = rows.first() {
        if matches!(first.get(1), Some(Value::String(_))) {
            rows = &rows[1..];
        }
    }
    if rows.len() != MONTHS_PER_SERIES {
        return Err(ProtocolError::shape(
            "timeseries",
            format!(
                "expected {MONTHS_PER_SERIES} monthly values, found {}",
                rows.len()
            ),
        ));
    }
    rows.iter()
        .enumerate()
        .map(|(month, row)| {
            let (label, value) = match row {
                Value::Array(cells) => match cells.as_slice() {
                    [label, value, ..] => (Some(label), value),
                    [value] => (None, value),
                    [] => {
                        return Err(ProtocolError::shape(
                            "timeseries",
                            format!("row {month} is empty"),
                        ));
                    }
                },
                value => (None, value),
            };
            let label = match label {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => MONTH_LABELS[month].to_string(),
            };
            Ok(MonthlyExposure {
                label,
                value: number_cell("timeseries", value)?,
            })
        })
        .collect()
}

fn number_cell(field: &'static str, value: &Value) -> Result<f64, ProtocolError> {
    match value {
        Value::Null => Ok(0.0),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| ProtocolError::shape(field, format!("{n} is not representable"))),
        other => Err(ProtocolError::shape(
            field,
            format!("expected a number, found {other}"),
        )),
    }
}
