use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};

use crate::{
    dataset::{MnistImage, MnistItem, WIDTH},
    error::MnistError,
    inference::Prediction,
};

/// Caption color of a correct prediction.
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
/// Caption color of a wrong prediction.
pub const RED: Rgb<u8> = Rgb([220, 20, 20]);
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

const SCALE: u32 = 2;
const FRAME: u32 = 2;
const MARGIN: u32 = 4;
const GLYPH_SCALE: u32 = 2;
const GLYPH_WIDTH: u32 = 3;
const GLYPH_HEIGHT: u32 = 5;
const CAPTION_HEIGHT: u32 = GLYPH_HEIGHT * GLYPH_SCALE + 4;

const TILE_SIZE: u32 = WIDTH as u32 * SCALE + 2 * FRAME;
const CELL_WIDTH: u32 = TILE_SIZE + 2 * MARGIN;
const CELL_HEIGHT: u32 = TILE_SIZE + CAPTION_HEIGHT + 2 * MARGIN;

// 3x5 bitmaps, one row per entry, most significant of the three bits on the left.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];

/// One grid cell: a digit image framed and captioned in `color`.
#[derive(Debug, Clone, Copy)]
pub struct Tile<'a> {
    pub image: &'a MnistImage,
    pub label: usize,
    pub color: Rgb<u8>,
}

/// Black when the prediction matches the expected label, red otherwise.
pub fn label_color(predicted: usize, expected: usize) -> Rgb<u8> {
    if predicted == expected {
        BLACK
    } else {
        RED
    }
}

/// Grid of images captioned with their true label.
pub fn render_samples(items: &[MnistItem], columns: usize) -> RgbImage {
    let tiles: Vec<_> = items
        .iter()
        .map(|item| Tile {
            image: &item.image,
            label: item.label as usize,
            color: BLACK,
        })
        .collect();

    render_grid(&tiles, columns)
}

/// Grid of images captioned with their predicted label, colored by correctness.
pub fn render_predictions(
    items: &[MnistItem],
    predictions: &[Prediction],
    columns: usize,
) -> RgbImage {
    let tiles: Vec<_> = items
        .iter()
        .zip(predictions)
        .map(|(item, prediction)| Tile {
            image: &item.image,
            label: prediction.label,
            color: label_color(prediction.label, item.label as usize),
        })
        .collect();

    render_grid(&tiles, columns)
}

/// Lays tiles out row by row, `columns` per row.
pub fn render_grid(tiles: &[Tile], columns: usize) -> RgbImage {
    let columns = columns.max(1);
    let rows = tiles.len().div_ceil(columns).max(1);
    let mut canvas = RgbImage::from_pixel(
        columns as u32 * CELL_WIDTH,
        rows as u32 * CELL_HEIGHT,
        BACKGROUND,
    );

    for (index, tile) in tiles.iter().enumerate() {
        let x = (index % columns) as u32 * CELL_WIDTH + MARGIN;
        let y = (index / columns) as u32 * CELL_HEIGHT + MARGIN;
        draw_tile(&mut canvas, tile, x, y);
    }

    canvas
}

fn draw_tile(canvas: &mut RgbImage, tile: &Tile, x: u32, y: u32) {
    fill_rect(canvas, x, y, TILE_SIZE, TILE_SIZE, tile.color);

    for (row, pixels) in tile.image.iter().enumerate() {
        for (col, value) in pixels.iter().enumerate() {
            fill_rect(
                canvas,
                x + FRAME + col as u32 * SCALE,
                y + FRAME + row as u32 * SCALE,
                SCALE,
                SCALE,
                Rgb([*value, *value, *value]),
            );
        }
    }

    let caption = tile.label.to_string();
    let caption_width = caption.len() as u32 * (GLYPH_WIDTH + 1) * GLYPH_SCALE;
    let caption_x = x + TILE_SIZE.saturating_sub(caption_width) / 2;
    let caption_y = y + TILE_SIZE + 2;

    for (position, digit) in caption.bytes().enumerate() {
        let glyph = &DIGITS[(digit - b'0') as usize];
        let glyph_x = caption_x + position as u32 * (GLYPH_WIDTH + 1) * GLYPH_SCALE;
        draw_glyph(canvas, glyph, glyph_x, caption_y, tile.color);
    }
}

fn draw_glyph(canvas: &mut RgbImage, glyph: &[u8; 5], x: u32, y: u32, color: Rgb<u8>) {
    for (row, bits) in glyph.iter().enumerate() {
        for col in 0..GLYPH_WIDTH {
            if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                fill_rect(
                    canvas,
                    x + col * GLYPH_SCALE,
                    y + row as u32 * GLYPH_SCALE,
                    GLYPH_SCALE,
                    GLYPH_SCALE,
                    color,
                );
            }
        }
    }
}

fn fill_rect(canvas: &mut RgbImage, x: u32, y: u32, width: u32, height: u32, color: Rgb<u8>) {
    let x_end = (x + width).min(canvas.width());
    let y_end = (y + height).min(canvas.height());

    for py in y..y_end {
        for px in x..x_end {
            canvas.put_pixel(px, py, color);
        }
    }
}

/// Save a rendered grid, creating the output directory if needed.
pub fn save_image(image: &RgbImage, path: &Path) -> Result<(), MnistError> {
    // Ensure the output directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    image.save(path)?;
    log::info!("Saved {}x{} grid to {}", image.width(), image.height(), path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::synthetic_item;

    fn prediction(label: usize) -> Prediction {
        Prediction {
            scores: vec![0.0; 10],
            probabilities: vec![0.1; 10],
            label,
        }
    }

    #[test]
    fn label_color_marks_mismatches_red() {
        assert_eq!(label_color(3, 3), BLACK);
        assert_eq!(label_color(3, 8), RED);
    }

    #[test]
    fn grid_has_one_cell_per_tile() {
        let items: Vec<_> = (0..25).map(|index| synthetic_item(index % 10)).collect();

        let image = render_samples(&items, 5);

        assert_eq!(image.width(), 5 * CELL_WIDTH);
        assert_eq!(image.height(), 5 * CELL_HEIGHT);
    }

    #[test]
    fn partial_last_row_still_allocates_a_row() {
        let items: Vec<_> = (0..11).map(|index| synthetic_item(index % 10)).collect();

        let image = render_samples(&items, 10);

        assert_eq!(image.height(), 2 * CELL_HEIGHT);
    }

    #[test]
    fn frames_follow_prediction_correctness() {
        let items = vec![synthetic_item(4), synthetic_item(5)];
        let predictions = vec![prediction(4), prediction(6)];

        let image = render_predictions(&items, &predictions, 2);

        assert_eq!(*image.get_pixel(MARGIN, MARGIN), BLACK);
        assert_eq!(*image.get_pixel(CELL_WIDTH + MARGIN, MARGIN), RED);
    }

    #[test]
    fn digit_pixels_are_upscaled_in_place() {
        let item = synthetic_item(0);
        // The bar of label 0 sits in column 4, rows 4..24.
        let x = MARGIN + FRAME + 4 * SCALE;
        let y = MARGIN + FRAME + 10 * SCALE;

        let image = render_samples(&[item], 1);

        assert_eq!(*image.get_pixel(x, y), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(x + 1, y + 1), Rgb([255, 255, 255]));
        assert_eq!(*image.get_pixel(x - SCALE, y), Rgb([0, 0, 0]));
    }

    #[test]
    fn saves_png_into_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("grid.png");

        save_image(&render_samples(&[synthetic_item(1)], 1), &path).unwrap();

        assert!(path.exists());
    }
}
