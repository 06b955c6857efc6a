use crate::errors::GridError;
use crate::models::GridGeometry;

/// Picks the grid that fits `tile_count` cells of aspect `tile_aspect_w : tile_aspect_h`
/// into the container with the largest possible cells.
///
/// Candidates come from the continuous optimum rounded three ways. Among those that
/// fit every tile, the largest binding scale wins and ties go to the fewest cells.
pub fn solve(
    container_width: f64,
    container_height: f64,
    tile_count: usize,
    tile_aspect_w: f64,
    tile_aspect_h: f64,
) -> Result<GridGeometry, GridError> {
    if tile_count == 0 {
        return Err(GridError::invalid("tile count must be at least 1"));
    }
    for (name, value) in [
        ("container width", container_width),
        ("container height", container_height),
        ("tile aspect width", tile_aspect_w),
        ("tile aspect height", tile_aspect_h),
    ] {
        if !value.is_finite() || value <= 0.0 {
            return Err(GridError::invalid(format!("{name} must be positive, got {value}")));
        }
    }

    let tiles = tile_count as f64;
    let height_factor = container_height / tile_aspect_h;
    let width_factor = container_width / tile_aspect_w;
    let scale_factor = height_factor / width_factor;

    let grid_width = (tiles / scale_factor).sqrt();
    let grid_height = (scale_factor * tiles).sqrt();

    let candidates = [
        (grid_width.ceil(), grid_height.floor()),
        (grid_width.floor(), grid_height.ceil()),
        (grid_width.ceil(), grid_height.ceil()),
    ];

    let mut chosen: Option<(usize, usize)> = None;
    let mut max_scale = 0.0_f64;
    let mut min_cells = usize::MAX;

    for (columns, rows) in candidates {
        let columns = columns as usize;
        let rows = rows as usize;
        let cells = columns.saturating_mul(rows);
        if cells < tile_count {
            continue;
        }

        let width_scale = container_width / columns as f64 / tile_aspect_w;
        let height_scale = container_height / rows as f64 / tile_aspect_h;
        let scale = width_scale.min(height_scale);

        if scale < max_scale {
            continue;
        }
        if scale == max_scale && cells > min_cells {
            continue;
        }
        chosen = Some((columns, rows));
        max_scale = scale;
        min_cells = cells;
    }

    let (columns, rows) =
        chosen.ok_or_else(|| GridError::invalid("no candidate grid fits every tile"))?;

    Ok(GridGeometry {
        columns,
        rows,
        cell_width: tile_aspect_w * max_scale,
        cell_height: tile_aspect_h * max_scale,
    })
}

/// The page only rebuilds its grid when the cell counts change, not on every pixel.
/// `previous` is the `(columns, rows)` currently shown, if any.
pub fn needs_rebuild(previous: Option<(usize, usize)>, next: &GridGeometry) -> bool {
    previous != Some((next.columns, next.rows))
}
