use crate::control_system::traffic_light_controller::LightState;
use crate::monitoring::traffic_monitoring_system::direction_color;
use crate::shared_data::FrameSnapshot;
use crate::simulation_engine::intersections::IntersectionGeometry;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

const ROAD_COLOR: RGBColor = RGBColor(0xd3, 0xd3, 0xd3);
const BOX_COLOR: RGBColor = RGBColor(0x69, 0x69, 0x69);
const VEHICLE_RADIUS: i32 = 4;

fn light_color(state: LightState) -> RGBColor {
    match state {
        LightState::Green => RGBColor(0x2c, 0xa0, 0x2c),
        LightState::Yellow => RGBColor(0xe6, 0xb4, 0x00),
        LightState::Red => RGBColor(0xd6, 0x27, 0x28),
    }
}

/// Writes one GIF frame per rendered simulation tick.
pub struct AnimationRecorder<'a> {
    root: DrawingArea<BitMapBackend<'a>, Shift>,
    geometry: IntersectionGeometry,
    /// Pixels per road unit.
    scale: f64,
    size: u32,
    frames: usize,
}

impl<'a> AnimationRecorder<'a> {
    /// Opens a square GIF of `size` pixels. `frame_delay_ms` is the time each
    /// frame stays on screen.
    pub fn create(
        path: &'a Path,
        geometry: IntersectionGeometry,
        size: u32,
        frame_delay_ms: u32,
    ) -> Result<Self, Box<dyn Error>> {
        let root = BitMapBackend::gif(path, (size, size), frame_delay_ms)?.into_drawing_area();
        Ok(Self {
            root,
            geometry,
            scale: f64::from(size) / geometry.road_length,
            size,
            frames: 0,
        })
    }

    /// Road coordinates to pixels, with y pointing up.
    fn to_pixel(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (x * self.scale).round() as i32,
            ((self.geometry.road_length - y) * self.scale).round() as i32,
        )
    }

    fn draw_roads(&self) -> Result<(), Box<dyn Error>> {
        let road = self.geometry.road_length;
        let (lo, hi) = self.geometry.lane_band();
        self.root.draw(&Rectangle::new(
            [self.to_pixel(0.0, hi), self.to_pixel(road, lo)],
            ROAD_COLOR.filled(),
        ))?;
        self.root.draw(&Rectangle::new(
            [self.to_pixel(lo, road), self.to_pixel(hi, 0.0)],
            ROAD_COLOR.filled(),
        ))?;

        let half = self.geometry.box_size() / 2.0;
        let center = self.geometry.center();
        self.root.draw(&Rectangle::new(
            [
                self.to_pixel(center - half, center + half),
                self.to_pixel(center + half, center - half),
            ],
            BOX_COLOR.filled(),
        ))?;
        Ok(())
    }

    pub fn render_frame(&mut self, frame: &FrameSnapshot) -> Result<(), Box<dyn Error>> {
        self.root.fill(&WHITE)?;
        self.draw_roads()?;

        for vehicle in &frame.vehicles {
            self.root.draw(&Circle::new(
                self.to_pixel(vehicle.x, vehicle.y),
                VEHICLE_RADIUS,
                direction_color(vehicle.direction).filled(),
            ))?;
        }

        let font = ("sans-serif", 14).into_font();
        let stats = [
            format!("Tick: {}", frame.tick),
            format!("Vehicles: {}", frame.vehicles.len()),
            format!("Throughput: {}", frame.throughput),
            format!("Avg wait: {:.2}", frame.avg_wait_time),
            format!("Avg travel: {:.2}", frame.avg_travel_time),
        ];
        for (row, line) in stats.iter().enumerate() {
            self.root.draw(&Text::new(
                line.clone(),
                (8, 8 + 18 * row as i32),
                font.clone(),
            ))?;
        }

        let right = self.size as i32 - 190;
        for (row, (axis, light)) in frame.lights.iter().enumerate() {
            let y = 8 + 18 * row as i32;
            self.root.draw(&Circle::new(
                (right - 10, y + 7),
                5,
                light_color(light.state).filled(),
            ))?;
            self.root.draw(&Text::new(
                format!("{}: {} ({})", axis, light.state, light.remaining_time),
                (right, y),
                font.clone(),
            ))?;
        }

        self.root.present()?;
        self.frames += 1;
        Ok(())
    }

    /// Closes the file. Returns the number of frames written.
    pub fn finish(self) -> usize {
        self.frames
    }
}
