//! # SafeRide Risk
//!
//! 确定性的事故风险评分（纯函数，无副作用）。
//!
//! ```text
//! risk = clamp(predicted_speed / speed_limit × 100, 0, 100)
//! ```
//!
//! 其中 `predicted_speed` 来自四个固定权重模型的平均（见 [`model`]），
//! 输入只有调用方传入的参数，不读取系统时间。

pub mod model;
pub mod types;

pub use model::{predicted_speed, traffic_density};
pub use types::*;

/// 缺少限速数据时使用的默认限速（km/h）
pub const DEFAULT_SPEED_LIMIT_KMH: u32 = 50;

/// 计算事故风险
///
/// # 规则
/// - 车速 `<= 0` 直接返回 0（静止车辆无风险），与其他输入无关
/// - 限速缺省为 [`DEFAULT_SPEED_LIMIT_KMH`]；限速为 0 时同样按缺省处理
/// - 结果保证在 `[0, 100]` 内
///
/// # 示例
///
/// ```rust
/// use saferide_risk::{GeoPoint, RiskInput, RoadType, Weather, predict_risk};
///
/// let input = RiskInput {
///     speed_kmh: 60,
///     speed_limit_kmh: Some(50),
///     location: GeoPoint::new(12.9716, 77.5946),
///     weather: Weather::Clear,
///     road_type: RoadType::Highway,
///     hour: 8,
/// };
/// let risk = predict_risk(&input);
/// assert!((risk.percentage - 84.96).abs() < 1e-9);
/// ```
pub fn predict_risk(input: &RiskInput) -> RiskOutput {
    if input.speed_kmh == 0 {
        return RiskOutput::default();
    }

    let limit = match input.speed_limit_kmh {
        Some(limit) if limit > 0 => limit,
        _ => DEFAULT_SPEED_LIMIT_KMH,
    };

    let density = traffic_density(input.location, input.hour);
    let predicted = predicted_speed(input.location, input.weather, input.road_type, input.hour);
    let percentage = (predicted / f64::from(limit) * 100.0).clamp(0.0, 100.0);

    RiskOutput {
        percentage,
        predicted_speed_kmh: predicted,
        traffic_density: density,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn input(speed: u32, limit: Option<u32>) -> RiskInput {
        RiskInput {
            speed_kmh: speed,
            speed_limit_kmh: limit,
            location: GeoPoint::new(12.9716, 77.5946),
            weather: Weather::Clear,
            road_type: RoadType::Highway,
            hour: 8,
        }
    }

    #[test]
    fn test_zero_speed_short_circuits() {
        let out = predict_risk(&input(0, Some(1)));
        assert_eq!(out.percentage, 0.0);
        assert_eq!(out.predicted_speed_kmh, 0.0);
    }

    #[test]
    fn test_reference_scenario() {
        let out = predict_risk(&input(60, Some(50)));
        let expected_speed = (38.88 + 62.88 + 20.64 + 47.52) / 4.0;
        assert!((out.predicted_speed_kmh - expected_speed).abs() < 1e-9);
        assert!((out.percentage - expected_speed / 50.0 * 100.0).abs() < 1e-9);
        assert_eq!(out.traffic_density, 0.9);
        assert_eq!(out.level(), RiskLevel::High);
    }

    #[test]
    fn test_missing_limit_defaults_to_fifty() {
        assert_eq!(predict_risk(&input(60, None)), predict_risk(&input(60, Some(50))));
        assert_eq!(predict_risk(&input(60, Some(0))), predict_risk(&input(60, Some(50))));
    }

    #[test]
    fn test_low_limit_saturates_at_hundred() {
        let out = predict_risk(&input(60, Some(10)));
        assert_eq!(out.percentage, 100.0);
    }

    #[test]
    fn test_current_speed_does_not_scale_risk() {
        // 模型只用车速做短路判断，期望车速与当前车速无关
        assert_eq!(predict_risk(&input(1, Some(50))), predict_risk(&input(180, Some(50))));
    }

    #[test]
    fn test_deterministic() {
        let a = predict_risk(&input(72, Some(60)));
        let b = predict_risk(&input(72, Some(60)));
        assert_eq!(a.percentage.to_bits(), b.percentage.to_bits());
    }

    fn weather_strategy() -> impl Strategy<Value = Weather> {
        prop_oneof![Just(Weather::Clear), Just(Weather::Foggy), Just(Weather::Rainy)]
    }

    fn road_strategy() -> impl Strategy<Value = RoadType> {
        prop_oneof![
            Just(RoadType::Residential),
            Just(RoadType::MarketRoad),
            Just(RoadType::Highway)
        ]
    }

    proptest! {
        #[test]
        fn prop_risk_is_bounded(
            speed in 0u32..400,
            limit in proptest::option::of(0u32..200),
            lat in -90.0f64..90.0,
            lon in -180.0f64..180.0,
            weather in weather_strategy(),
            road_type in road_strategy(),
            hour in 0u8..24,
        ) {
            let out = predict_risk(&RiskInput {
                speed_kmh: speed,
                speed_limit_kmh: limit,
                location: GeoPoint::new(lat, lon),
                weather,
                road_type,
                hour,
            });
            prop_assert!((0.0..=100.0).contains(&out.percentage));
            if speed == 0 {
                prop_assert_eq!(out.percentage, 0.0);
            } else {
                prop_assert!((15.0..=80.0).contains(&out.predicted_speed_kmh));
            }
        }
    }
}
