//! 离线风险评分命令

use crate::settings::Settings;
use anyhow::Result;
use clap::Args;
use saferide_sdk::driver::{Clock, SystemClock};
use saferide_sdk::risk::{GeoPoint, RiskInput, RiskOutput, RoadType, Weather, predict_risk};

/// 离线评分参数
#[derive(Args, Debug)]
pub struct RiskCommand {
    /// 当前车速（km/h）
    #[arg(short, long)]
    pub speed: u32,

    /// 道路限速（km/h），缺省为 50
    #[arg(short, long)]
    pub limit: Option<u32>,

    /// 天气：clear / foggy / rainy（缺省取配置）
    #[arg(short, long)]
    pub weather: Option<Weather>,

    /// 道路类型：residential / market_road / highway（缺省取配置）
    #[arg(short, long)]
    pub road: Option<RoadType>,

    /// 本地小时 0–23（缺省取系统时间 + 配置的 UTC 偏移）
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
    pub hour: Option<u8>,

    /// 纬度（缺省取配置的默认位置）
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// 经度
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// 以 JSON 输出
    #[arg(long)]
    pub json: bool,
}

impl RiskCommand {
    pub fn input(&self, settings: &Settings) -> RiskInput {
        let link = &settings.link;
        let location = match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => GeoPoint::new(lat, lon),
            _ => link.default_location,
        };
        RiskInput {
            speed_kmh: self.speed,
            speed_limit_kmh: self.limit,
            location,
            weather: self.weather.unwrap_or(link.risk_context.weather),
            road_type: self.road.unwrap_or(link.risk_context.road_type),
            hour: self
                .hour
                .unwrap_or_else(|| SystemClock::new(link.utc_offset_minutes).local_hour()),
        }
    }

    pub fn execute(&self, settings: &Settings) -> Result<()> {
        let input = self.input(settings);
        let output = predict_risk(&input);

        if self.json {
            println!("{}", render_json(&input, &output)?);
        } else {
            println!("Location:        {}", input.location);
            println!(
                "Conditions:      {:?}, {:?}, {:02}:00",
                input.weather, input.road_type, input.hour
            );
            println!("Traffic density: {:.1}", output.traffic_density);
            println!("Predicted speed: {:.2} km/h", output.predicted_speed_kmh);
            println!(
                "Accident risk:   {:.2}% ({:?})",
                output.percentage,
                output.level()
            );
        }
        Ok(())
    }
}

fn render_json(input: &RiskInput, output: &RiskOutput) -> Result<String> {
    let value = serde_json::json!({
        "speed_kmh": input.speed_kmh,
        "speed_limit_kmh": input.speed_limit_kmh,
        "location": input.location,
        "weather": input.weather,
        "road_type": input.road_type,
        "hour": input.hour,
        "risk": output,
        "level": output.level(),
    });
    Ok(serde_json::to_string_pretty(&value)?)
}
