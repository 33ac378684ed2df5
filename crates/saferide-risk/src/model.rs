//! 期望车速集成模型
//!
//! 四个固定权重的线性模型取平均。权重是常量表，不是训练得到的。

use crate::types::{GeoPoint, RoadType, TimeOfDay, Weather};

/// 单个模型对四个特征的权重
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelWeights {
    pub weather: f64,
    pub road_type: f64,
    pub time_of_day: f64,
    pub traffic_density: f64,
}

/// 集成模型权重表
///
/// | 模型 | 侧重 | weather | road | time | traffic |
/// |---|---|---|---|---|---|
/// | 1 | 天气 | 0.4 | 0.3 | 0.2 | 0.1 |
/// | 2 | 道路 | 0.2 | 0.5 | 0.2 | 0.1 |
/// | 3 | 时段 | 0.2 | 0.1 | 0.4 | 0.3 |
/// | 4 | 交通 | 0.1 | 0.3 | 0.2 | 0.4 |
pub const ENSEMBLE: [ModelWeights; 4] = [
    ModelWeights {
        weather: 0.4,
        road_type: 0.3,
        time_of_day: 0.2,
        traffic_density: 0.1,
    },
    ModelWeights {
        weather: 0.2,
        road_type: 0.5,
        time_of_day: 0.2,
        traffic_density: 0.1,
    },
    ModelWeights {
        weather: 0.2,
        road_type: 0.1,
        time_of_day: 0.4,
        traffic_density: 0.3,
    },
    ModelWeights {
        weather: 0.1,
        road_type: 0.3,
        time_of_day: 0.2,
        traffic_density: 0.4,
    },
];

/// 期望车速的下限（km/h）
pub const MIN_PREDICTED_SPEED_KMH: f64 = 15.0;
/// 期望车速的上限（km/h）
pub const MAX_PREDICTED_SPEED_KMH: f64 = 80.0;

/// 城区范围（纬度、经度闭区间）
pub const URBAN_LATITUDE: (f64, f64) = (12.8, 13.2);
pub const URBAN_LONGITUDE: (f64, f64) = (77.4, 77.8);

/// 是否为高峰时段（7–10 点、17–20 点）
pub fn is_peak_hour(hour: u8) -> bool {
    matches!(hour, 7..=10 | 17..=20)
}

/// 坐标是否落在城区范围内
pub fn is_urban(location: GeoPoint) -> bool {
    (URBAN_LATITUDE.0..=URBAN_LATITUDE.1).contains(&location.latitude)
        && (URBAN_LONGITUDE.0..=URBAN_LONGITUDE.1).contains(&location.longitude)
}

/// 交通密度因子
///
/// 城区 + 高峰 → 0.9，仅城区 → 0.6，仅高峰 → 0.4，都不是 → 0.2
pub fn traffic_density(location: GeoPoint, hour: u8) -> f64 {
    match (is_urban(location), is_peak_hour(hour)) {
        (true, true) => 0.9,
        (true, false) => 0.6,
        (false, true) => 0.4,
        (false, false) => 0.2,
    }
}

/// 单个模型的输出
///
/// 每个分类特征的贡献为 `编码 × 权重 × 类别车速`，
/// 交通密度的贡献为 `密度 × 权重 × (50 − 20 × 密度)`。
pub fn model_output(
    weights: &ModelWeights,
    weather: Weather,
    road_type: RoadType,
    time: TimeOfDay,
    density: f64,
) -> f64 {
    // 累加顺序固定，保证逐位可复现
    let mut total = 0.0;
    total += f64::from(weather.code()) * weights.weather * weather.speed_magnitude();
    total += f64::from(road_type.code()) * weights.road_type * road_type.speed_magnitude();
    total += f64::from(time.code()) * weights.time_of_day * time.speed_magnitude();
    total += density * weights.traffic_density * (50.0 - density * 20.0);
    total
}

/// 集成预测的期望车速（km/h），已截断到 `[15, 80]`
pub fn predicted_speed(location: GeoPoint, weather: Weather, road_type: RoadType, hour: u8) -> f64 {
    let time = TimeOfDay::from_hour(hour);
    let density = traffic_density(location, hour);

    let mut total = 0.0;
    for weights in &ENSEMBLE {
        total += model_output(weights, weather, road_type, time, density);
    }
    let average = total / ENSEMBLE.len() as f64;

    average.clamp(MIN_PREDICTED_SPEED_KMH, MAX_PREDICTED_SPEED_KMH)
}
