//! 评分输入/输出类型

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 地理坐标（WGS84，度）
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// 分类字符串解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown {category} value: {value:?}")]
pub struct ParseCategoryError {
    pub category: &'static str,
    pub value: String,
}

/// 天气类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Weather {
    #[default]
    Clear,
    Foggy,
    Rainy,
}

impl Weather {
    /// 类别编码
    pub fn code(self) -> u8 {
        match self {
            Weather::Clear => 0,
            Weather::Foggy => 1,
            Weather::Rainy => 2,
        }
    }

    /// 该天气下的典型车速（km/h）
    pub fn speed_magnitude(self) -> f64 {
        match self {
            Weather::Clear => 45.0,
            Weather::Foggy => 35.0,
            Weather::Rainy => 30.0,
        }
    }
}

impl FromStr for Weather {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "clear" => Ok(Weather::Clear),
            "foggy" => Ok(Weather::Foggy),
            "rainy" => Ok(Weather::Rainy),
            _ => Err(ParseCategoryError {
                category: "weather",
                value: s.to_owned(),
            }),
        }
    }
}

/// 道路类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum RoadType {
    Residential,
    MarketRoad,
    #[default]
    Highway,
}

impl RoadType {
    pub fn code(self) -> u8 {
        match self {
            RoadType::Residential => 0,
            RoadType::MarketRoad => 1,
            RoadType::Highway => 2,
        }
    }

    pub fn speed_magnitude(self) -> f64 {
        match self {
            RoadType::Residential => 25.0,
            RoadType::MarketRoad => 40.0,
            RoadType::Highway => 60.0,
        }
    }
}

impl FromStr for RoadType {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "residential" => Ok(RoadType::Residential),
            "market_road" | "market-road" | "market" => Ok(RoadType::MarketRoad),
            "highway" => Ok(RoadType::Highway),
            _ => Err(ParseCategoryError {
                category: "road type",
                value: s.to_owned(),
            }),
        }
    }
}

/// 时段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeOfDay {
    /// 6:00–11:59
    Morning,
    /// 12:00–17:59
    Afternoon,
    /// 18:00–21:59
    Evening,
    /// 其余时间
    Night,
}

impl TimeOfDay {
    /// 按小时（0–23）分桶，超出范围的值归入夜间
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            6..=11 => TimeOfDay::Morning,
            12..=17 => TimeOfDay::Afternoon,
            18..=21 => TimeOfDay::Evening,
            _ => TimeOfDay::Night,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            TimeOfDay::Morning => 0,
            TimeOfDay::Afternoon => 1,
            TimeOfDay::Evening => 2,
            TimeOfDay::Night => 3,
        }
    }

    pub fn speed_magnitude(self) -> f64 {
        match self {
            TimeOfDay::Morning => 35.0,
            TimeOfDay::Afternoon => 40.0,
            TimeOfDay::Evening => 45.0,
            TimeOfDay::Night => 50.0,
        }
    }
}

/// 外部提供的道路环境（天气 + 道路类型）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskContext {
    pub weather: Weather,
    pub road_type: RoadType,
}

/// 评分输入
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskInput {
    /// 当前车速（km/h）
    pub speed_kmh: u32,
    /// 道路限速（km/h），缺省时使用 [`DEFAULT_SPEED_LIMIT_KMH`](crate::DEFAULT_SPEED_LIMIT_KMH)
    pub speed_limit_kmh: Option<u32>,
    pub location: GeoPoint,
    pub weather: Weather,
    pub road_type: RoadType,
    /// 本地时间的小时（0–23），由调用方提供
    pub hour: u8,
}

/// 风险等级（用于展示）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= 70.0 {
            RiskLevel::High
        } else if percentage >= 40.0 {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

/// 评分结果
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RiskOutput {
    /// 风险百分比，保证在 `[0, 100]` 内
    pub percentage: f64,
    /// 集成模型预测的期望车速（km/h）；车速为 0 时短路，值为 0
    pub predicted_speed_kmh: f64,
    /// 交通密度因子（0.2 / 0.4 / 0.6 / 0.9）；短路时为 0
    pub traffic_density: f64,
}

impl RiskOutput {
    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_percentage(self.percentage)
    }
}
