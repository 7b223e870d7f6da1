use anyhow::{anyhow, bail, Result};
use plotters::prelude::*;
use printpdf::image_crate::RgbImage;

use crate::calc::{ReportRow, Status};
use crate::normalize::ScoreRecord;
use crate::rtl::reshape;

/// Status colors carried over from the dashboard's palette.
fn status_color(status: Status) -> RGBColor {
    match status {
        Status::NeedsImprovement => RED,
        Status::Acceptable => RGBColor(255, 165, 0),
        Status::Good => BLUE,
        Status::VeryGood => GREEN,
    }
}

fn unique_weeks(records: &[ScoreRecord]) -> Vec<String> {
    let mut weeks: Vec<String> = Vec::new();
    for r in records {
        if !weeks.iter().any(|w| w == &r.week) {
            weeks.push(r.week.clone());
        }
    }
    weeks
}

/// Line chart of one student's score trend across weeks, one series per
/// lesson. `records` must already be restricted to that student.
pub fn line_trend(
    records: &[ScoreRecord],
    title: &str,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    if records.is_empty() {
        bail!("no data points to draw");
    }

    let weeks = unique_weeks(records);
    let lessons = crate::calc::lessons(records);
    let max_score = records.iter().map(|r| r.score).max().unwrap_or(4).max(1);

    let mut buf = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("{}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(reshape(title), ("sans-serif", 22).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(40)
            .build_cartesian_2d(
                -0.5f64..(weeks.len() as f64 - 0.5),
                0f64..(max_score as f64 + 1.0),
            )
            .map_err(|e| anyhow!("{}", e))?;

        chart
            .configure_mesh()
            .x_labels(weeks.len())
            .x_label_formatter(&|x: &f64| {
                let i = x.round();
                if (x - i).abs() < 0.25 && i >= 0.0 && (i as usize) < weeks.len() {
                    reshape(&weeks[i as usize])
                } else {
                    String::new()
                }
            })
            .draw()
            .map_err(|e| anyhow!("{}", e))?;

        for (i, lesson) in lessons.iter().enumerate() {
            let color = Palette99::pick(i).mix(1.0);
            let style = ShapeStyle::from(&color).stroke_width(2);
            let points: Vec<(f64, f64)> = records
                .iter()
                .filter(|r| &r.lesson == lesson)
                .filter_map(|r| {
                    weeks
                        .iter()
                        .position(|w| w == &r.week)
                        .map(|x| (x as f64, r.score as f64))
                })
                .collect();
            chart
                .draw_series(LineSeries::new(points.iter().copied(), style))
                .map_err(|e| anyhow!("{}", e))?
                .label(reshape(lesson))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 18, y)], style));
            chart
                .draw_series(
                    points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), 3, color.filled())),
                )
                .map_err(|e| anyhow!("{}", e))?;
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(|e| anyhow!("{}", e))?;

        root.present().map_err(|e| anyhow!("{}", e))?;
    }

    RgbImage::from_raw(width, height, buf).ok_or_else(|| anyhow!("chart buffer size mismatch"))
}

/// Bar chart of the student's own per-lesson status counts.
pub fn status_distribution(
    rows: &[ReportRow],
    title: &str,
    width: u32,
    height: u32,
) -> Result<RgbImage> {
    let mut counts = [0usize; 4];
    for row in rows {
        if let Some(status) = row.status {
            let slot = Status::ALL.iter().position(|s| *s == status).unwrap();
            counts[slot] += 1;
        }
    }
    if counts.iter().all(|c| *c == 0) {
        bail!("no statused lessons to draw");
    }
    let max_count = *counts.iter().max().unwrap_or(&1);

    let mut buf = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| anyhow!("{}", e))?;

        let mut chart = ChartBuilder::on(&root)
            .caption(reshape(title), ("sans-serif", 22).into_font())
            .margin(10)
            .x_label_area_size(30)
            .y_label_area_size(30)
            .build_cartesian_2d(-0.5f64..3.5f64, 0f64..(max_count as f64 + 1.0))
            .map_err(|e| anyhow!("{}", e))?;

        chart
            .configure_mesh()
            .x_labels(4)
            .x_label_formatter(&|x: &f64| {
                let i = x.round();
                if (x - i).abs() < 0.25 && i >= 0.0 && (i as usize) < Status::ALL.len() {
                    reshape(Status::ALL[i as usize].label())
                } else {
                    String::new()
                }
            })
            .y_labels(max_count + 1)
            .draw()
            .map_err(|e| anyhow!("{}", e))?;

        chart
            .draw_series(Status::ALL.iter().enumerate().map(|(i, status)| {
                let x = i as f64;
                Rectangle::new(
                    [(x - 0.35, 0.0), (x + 0.35, counts[i] as f64)],
                    status_color(*status).filled(),
                )
            }))
            .map_err(|e| anyhow!("{}", e))?;

        root.present().map_err(|e| anyhow!("{}", e))?;
    }

    RgbImage::from_raw(width, height, buf).ok_or_else(|| anyhow!("chart buffer size mismatch"))
}
