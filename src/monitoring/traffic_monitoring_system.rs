use crate::flow_analyzer::traffic_analyzer::{
    average_queue_lengths, histogram, mean, throughput_by_direction, travel_times, Histogram,
    RunSummary,
};
use crate::global_variables::*;
use crate::shared_data::{Metrics, RemovedVehicleRecord};
use crate::simulation_engine::intersections::Direction;
use crate::simulation_engine::vehicles::Vehicle;
use chrono::Local;
use log::{info, warn};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::Serialize;
use std::error::Error;
use std::f64::consts::{FRAC_PI_2, TAU};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Colour of each direction, in `Direction::ALL` order.
pub const DIRECTION_COLORS: [RGBColor; 4] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
];

const CHART_SIZE: (u32, u32) = (1000, 600);
const COMPOSITE_SIZE: (u32, u32) = (1600, 1200);

pub fn direction_color(direction: Direction) -> RGBColor {
    let index = Direction::ALL
        .iter()
        .position(|&d| d == direction)
        .unwrap_or(0);
    DIRECTION_COLORS[index]
}

/// Suffix shared by every file of one run, e.g. `20240131_154502`.
pub fn run_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn stamped(output_dir: &Path, prefix: &str, stamp: &str, extension: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.{}", prefix, stamp, extension))
}

/// One slice of the throughput pie. Angles are in radians, counter-clockwise
/// from the positive x axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PieWedge {
    pub direction: Direction,
    pub start: f64,
    pub sweep: f64,
    pub share: f64,
}

/// Splits a full turn between the non-zero counts, starting at the top and
/// going counter-clockwise. Empty when every count is zero.
pub fn pie_wedges(counts: &[(Direction, usize)]) -> Vec<PieWedge> {
    let total: usize = counts.iter().map(|&(_, c)| c).sum();
    if total == 0 {
        return Vec::new();
    }
    let mut start = FRAC_PI_2;
    counts
        .iter()
        .filter(|&&(_, count)| count > 0)
        .map(|&(direction, count)| {
            let share = count as f64 / total as f64;
            let wedge = PieWedge {
                direction,
                start,
                sweep: share * TAU,
                share,
            };
            start += wedge.sweep;
            wedge
        })
        .collect()
}

fn draw_queue_lengths<DB>(area: &DrawingArea<DB, Shift>, metrics: &Metrics) -> Result<bool, Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let ticks = Direction::ALL
        .iter()
        .map(|&d| metrics.queue_lengths(d).len())
        .max()
        .unwrap_or(0);
    if ticks == 0 {
        return Ok(false);
    }
    let peak = Direction::ALL
        .iter()
        .flat_map(|&d| metrics.queue_lengths(d).iter().copied())
        .max()
        .unwrap_or(0);

    let mut chart = ChartBuilder::on(area)
        .caption("Queue length over time", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0usize..ticks, 0usize..peak + 1)?;

    chart
        .configure_mesh()
        .x_desc("Tick")
        .y_desc("Queued vehicles")
        .draw()?;

    for &direction in Direction::ALL.iter() {
        let color = direction_color(direction);
        chart
            .draw_series(LineSeries::new(
                metrics
                    .queue_lengths(direction)
                    .iter()
                    .enumerate()
                    .map(|(tick, &queue)| (tick, queue)),
                color.stroke_width(2),
            ))?
            .label(direction.name())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(true)
}

fn draw_average_queue_bars<DB>(
    area: &DrawingArea<DB, Shift>,
    averages: &[(Direction, f64)],
) -> Result<bool, Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    if averages.iter().all(|&(_, avg)| avg == 0.0) {
        return Ok(false);
    }
    let peak = averages.iter().map(|&(_, avg)| avg).fold(0.0, f64::max);
    let top = if peak > 0.0 { peak * 1.2 } else { 1.0 };

    let mut chart = ChartBuilder::on(area)
        .caption("Average queue length by direction", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d((0usize..averages.len()).into_segmented(), 0.0..top)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc("Vehicles")
        .x_label_formatter(&|x: &SegmentValue<usize>| match x {
            SegmentValue::CenterOf(i) => averages
                .get(*i)
                .map(|(d, _)| d.name().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        })
        .draw()?;

    chart.draw_series(averages.iter().enumerate().map(|(i, &(direction, avg))| {
        Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), avg)],
            direction_color(direction).mix(0.8).filled(),
        )
    }))?;
    chart.draw_series(averages.iter().enumerate().map(|(i, &(_, avg))| {
        Text::new(
            format!("{:.2}", avg),
            (SegmentValue::CenterOf(i), avg),
            TextStyle::from(("sans-serif", 16).into_font()).pos(Pos::new(HPos::Center, VPos::Bottom)),
        )
    }))?;
    Ok(true)
}

fn draw_throughput_pie<DB>(
    area: &DrawingArea<DB, Shift>,
    counts: &[(Direction, usize)],
) -> Result<bool, Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let wedges = pie_wedges(counts);
    if wedges.is_empty() {
        return Ok(false);
    }
    let area = area.titled("Throughput by direction", ("sans-serif", 24))?;
    let (width, height) = area.dim_in_pixel();
    let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
    let radius = width.min(height) as f64 * 0.38;
    let at = |angle: f64, r: f64| ((cx + r * angle.cos()) as i32, (cy - r * angle.sin()) as i32);

    for wedge in &wedges {
        let steps = ((wedge.sweep / TAU) * 120.0).ceil().max(2.0) as usize;
        let mut points = vec![at(0.0, 0.0)];
        points.extend((0..=steps).map(|k| at(wedge.start + wedge.sweep * k as f64 / steps as f64, radius)));
        area.draw(&Polygon::new(points, direction_color(wedge.direction).filled()))?;

        let middle = wedge.start + wedge.sweep / 2.0;
        let centered = TextStyle::from(("sans-serif", 18).into_font()).pos(Pos::new(HPos::Center, VPos::Center));
        area.draw(&Text::new(
            format!("{:.1}%", wedge.share * 100.0),
            at(middle, radius * 0.6),
            centered.clone().color(&WHITE),
        ))?;
        area.draw(&Text::new(
            wedge.direction.name().to_string(),
            at(middle, radius * 1.15),
            centered,
        ))?;
    }
    Ok(true)
}

fn draw_travel_time_histogram<DB>(area: &DrawingArea<DB, Shift>, removed: &[Vehicle]) -> Result<bool, Box<dyn Error>>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    let times = travel_times(removed);
    let (hist, average): (Histogram, f64) = match (histogram(&times, TRAVEL_TIME_BINS), mean(&times)) {
        (Some(hist), Some(average)) => (hist, average),
        _ => return Ok(false),
    };
    let lo = hist.edges[0];
    let hi = hist.edges[hist.edges.len() - 1];
    let top = hist.max_count() as f64 * 1.15;

    let mut chart = ChartBuilder::on(area)
        .caption("Travel time distribution", ("sans-serif", 24))
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(lo..hi, 0.0..top)?;

    chart
        .configure_mesh()
        .x_desc("Travel time (ticks)")
        .y_desc("Vehicles")
        .draw()?;

    chart.draw_series(hist.bins().map(|(left, right, count)| {
        Rectangle::new([(left, 0.0), (right, count as f64)], DIRECTION_COLORS[2].mix(0.7).filled())
    }))?;
    chart
        .draw_series(LineSeries::new(vec![(average, 0.0), (average, top)], RED.stroke_width(2)))?
        .label(format!("Mean: {:.2}", average))
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED.stroke_width(2)));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;
    Ok(true)
}

fn render_single<F>(path: &Path, size: (u32, u32), draw: F) -> Result<bool, Box<dyn Error>>
where
    F: FnOnce(&DrawingArea<BitMapBackend, Shift>) -> Result<bool, Box<dyn Error>>,
{
    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let drawn = draw(&root)?;
    root.present()?;
    Ok(drawn)
}

fn keep_if_drawn(path: &Path, drawn: bool, label: &str, written: &mut Vec<PathBuf>) {
    if drawn {
        info!("Saved {} chart to {}", label, path.display());
        written.push(path.to_path_buf());
    } else {
        warn!("No data for the {} chart, skipping it", label);
        std::fs::remove_file(path).ok();
    }
}

/// Draws the four traffic charts and the 2x2 composite into `output_dir`.
/// Charts without data are skipped. Returns the files written.
pub fn plot_metrics(
    output_dir: &Path,
    stamp: &str,
    metrics: &Metrics,
    removed: &[Vehicle],
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    let averages = average_queue_lengths(metrics);
    let throughput = throughput_by_direction(removed);
    let mut written = Vec::new();

    let charts: [(&str, &str); 4] = [
        (QUEUE_LENGTH_CHART, "queue length"),
        (AVG_QUEUE_CHART, "average queue"),
        (THROUGHPUT_CHART, "throughput"),
        (TRAVEL_TIME_CHART, "travel time"),
    ];
    for (index, (prefix, label)) in charts.iter().enumerate() {
        let path = stamped(output_dir, prefix, stamp, "png");
        let drawn = render_single(&path, CHART_SIZE, |root| match index {
            0 => draw_queue_lengths(root, metrics),
            1 => draw_average_queue_bars(root, &averages),
            2 => draw_throughput_pie(root, &throughput),
            _ => draw_travel_time_histogram(root, removed),
        })?;
        keep_if_drawn(&path, drawn, label, &mut written);
    }

    let path = stamped(output_dir, COMPOSITE_CHART, stamp, "png");
    let drawn = render_single(&path, COMPOSITE_SIZE, |root| {
        let panels = root.split_evenly((2, 2));
        let queue = draw_queue_lengths(&panels[0], metrics)?;
        let bars = draw_average_queue_bars(&panels[1], &averages)?;
        let pie = draw_throughput_pie(&panels[2], &throughput)?;
        let hist = draw_travel_time_histogram(&panels[3], removed)?;
        Ok(queue || bars || pie || hist)
    })?;
    keep_if_drawn(&path, drawn, "composite", &mut written);

    Ok(written)
}

/// One row of the queue length table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueueLengthRow {
    pub tick: usize,
    pub north: usize,
    pub south: usize,
    pub east: usize,
    pub west: usize,
}

pub fn queue_length_rows(metrics: &Metrics) -> Vec<QueueLengthRow> {
    let sample = |direction: Direction, tick: usize| {
        metrics
            .queue_lengths(direction)
            .get(tick)
            .copied()
            .unwrap_or(0)
    };
    let ticks = Direction::ALL
        .iter()
        .map(|&d| metrics.queue_lengths(d).len())
        .max()
        .unwrap_or(0);
    (0..ticks)
        .map(|tick| QueueLengthRow {
            tick: tick + 1,
            north: sample(Direction::North, tick),
            south: sample(Direction::South, tick),
            east: sample(Direction::East, tick),
            west: sample(Direction::West, tick),
        })
        .collect()
}

fn write_csv<T: Serialize>(path: &Path, rows: impl IntoIterator<Item = T>) -> Result<usize, Box<dyn Error>> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut count = 0;
    for row in rows {
        wtr.serialize(row)?;
        count += 1;
    }
    wtr.flush()?;
    Ok(count)
}

/// Writes one row per removed vehicle. Returns the number of rows.
pub fn export_removed_vehicles(path: &Path, removed: &[Vehicle]) -> Result<usize, Box<dyn Error>> {
    write_csv(path, removed.iter().map(RemovedVehicleRecord::from))
}

/// Writes the per-tick queue lengths of all four directions.
pub fn export_queue_lengths(path: &Path, metrics: &Metrics) -> Result<usize, Box<dyn Error>> {
    write_csv(path, queue_length_rows(metrics))
}

pub fn write_run_summary(path: &Path, summary: &RunSummary) -> Result<(), Box<dyn Error>> {
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, summary)?;
    Ok(())
}

/// Counts the data rows of a CSV file.
pub fn count_csv_records(path: &Path) -> Result<usize, Box<dyn Error>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let mut count = 0;
    for record in rdr.records() {
        record?;
        count += 1;
    }
    Ok(count)
}

/// Writes the CSV and JSON exports, and the charts when `with_charts` is set.
pub fn write_reports(
    output_dir: &Path,
    stamp: &str,
    metrics: &Metrics,
    removed: &[Vehicle],
    summary: &RunSummary,
    with_charts: bool,
) -> Result<Vec<PathBuf>, Box<dyn Error>> {
    std::fs::create_dir_all(output_dir)?;
    let mut written = Vec::new();

    let path = stamped(output_dir, REMOVED_VEHICLES_CSV, stamp, "csv");
    let rows = export_removed_vehicles(&path, removed)?;
    info!("Wrote {} removed vehicles to {}", rows, path.display());
    written.push(path);

    let path = stamped(output_dir, QUEUE_LENGTHS_CSV, stamp, "csv");
    let rows = export_queue_lengths(&path, metrics)?;
    info!("Wrote {} queue samples to {}", rows, path.display());
    written.push(path);

    let path = stamped(output_dir, RUN_SUMMARY_JSON, stamp, "json");
    write_run_summary(&path, summary)?;
    written.push(path);

    if with_charts {
        written.extend(plot_metrics(output_dir, stamp, metrics, removed)?);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation_engine::intersections::Point2d;
    use crate::simulation_engine::vehicles::{RemovalCause, TurnIntent, VehicleParams};
    use assert_approx_eq::assert_approx_eq;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("intersection_sim_{}_{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn exited(id: u64, direction: Direction, entry: u64, exit: u64) -> Vehicle {
        let mut vehicle = Vehicle::new(id, direction, VehicleParams::default(), TurnIntent::Left);
        vehicle.place(Point2d::new(100.0, 0.0), entry);
        vehicle.mark_removed(RemovalCause::Exited, exit);
        vehicle
    }

    #[test]
    fn wedges_cover_a_full_turn() {
        let wedges = pie_wedges(&[
            (Direction::North, 3),
            (Direction::South, 0),
            (Direction::East, 1),
            (Direction::West, 4),
        ]);
        assert_eq!(wedges.len(), 3);
        assert_approx_eq!(wedges[0].start, FRAC_PI_2);
        assert_approx_eq!(wedges.iter().map(|w| w.sweep).sum::<f64>(), TAU);
        assert_approx_eq!(wedges[2].share, 0.5);
        assert_approx_eq!(wedges[1].start, wedges[0].start + wedges[0].sweep);
    }

    #[test]
    fn no_wedges_without_throughput() {
        assert!(pie_wedges(&[(Direction::North, 0), (Direction::West, 0)]).is_empty());
    }

    #[test]
    fn all_zero_queue_averages_are_not_charted() {
        let mut buffer = vec![0u8; 64 * 64 * 3];
        let root = BitMapBackend::with_buffer(&mut buffer, (64, 64)).into_drawing_area();
        let averages: Vec<(Direction, f64)> = Direction::ALL.iter().map(|&d| (d, 0.0)).collect();
        assert!(!draw_average_queue_bars(&root, &averages).unwrap());
    }

    #[test]
    fn empty_run_writes_no_charts() {
        let dir = scratch_dir("empty_charts");
        let mut no_queues = Metrics::new();
        no_queues.record_spawn();

        let written = plot_metrics(&dir, "empty", &no_queues, &[]).unwrap();
        assert!(written.is_empty());
        let leftovers = std::fs::read_dir(&dir).unwrap().count();
        assert_eq!(leftovers, 0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn queue_rows_line_up_by_tick() {
        let mut metrics = Metrics::new();
        metrics.record_queue_lengths([(Direction::North, 2), (Direction::South, 0), (Direction::East, 1), (Direction::West, 0)]);
        metrics.record_queue_lengths([(Direction::North, 3), (Direction::South, 1), (Direction::East, 0), (Direction::West, 0)]);
        let rows = queue_length_rows(&metrics);
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[1],
            QueueLengthRow {
                tick: 2,
                north: 3,
                south: 1,
                east: 0,
                west: 0
            }
        );
    }

    #[test]
    fn removed_vehicles_csv_has_one_row_each() {
        let dir = scratch_dir("removed");
        let path = dir.join("removed.csv");
        let removed = vec![
            exited(1, Direction::North, 0, 40),
            exited(2, Direction::East, 5, 60),
        ];
        assert_eq!(export_removed_vehicles(&path, &removed).unwrap(), 2);
        assert_eq!(count_csv_records(&path).unwrap(), 2);

        let mut rdr = csv::Reader::from_path(&path).unwrap();
        let headers = rdr.headers().unwrap().clone();
        assert_eq!(&headers[0], "id");
        assert!(headers.iter().any(|h| h == "travel_ticks"));
        let second = rdr.records().nth(1).unwrap().unwrap();
        assert_eq!(&second[1], "east");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reports_without_charts_write_three_files() {
        let dir = scratch_dir("reports");
        let removed = vec![exited(1, Direction::West, 2, 30)];
        let mut metrics = Metrics::new();
        metrics.record_exit(28, 0);
        metrics.record_queue_lengths(Direction::ALL.iter().map(|&d| (d, 0)));
        let summary = RunSummary::collect(30, &metrics, &removed, 0);

        let written = write_reports(&dir, "test", &metrics, &removed, &summary, false).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written.iter().all(|p| p.exists()));

        let json: serde_json::Value =
            serde_json::from_reader(File::open(dir.join("run_summary_test.json")).unwrap()).unwrap();
        assert_eq!(json["throughput"], 1);
        assert_eq!(json["ticks"], 30);
        std::fs::remove_dir_all(&dir).ok();
    }
}
