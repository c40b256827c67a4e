#[allow(unused)]
use crate::prelude::*;

/// Flattens a `(..., width)` tensor into a `(rows, width)` matrix.
///
/// Returns the matrix and the leading dimensions needed to restore the shape.
pub fn to_matrix(x: &ArrayD<f64>, width: usize) -> Result<(Array2<f64>, Vec<usize>)> {
    let shape = x.shape();
    let last = *shape.last().ok_or_else(|| {
        NNError::ShapeMismatch("expected an input of rank >= 1, got a scalar".to_string())
    })?;
    if last != width {
        return Err(NNError::ShapeMismatch(format!(
            "expected last dimension {}, got {} (input shape {:?})",
            width, last, shape
        )));
    }
    let lead = shape[..shape.len() - 1].to_vec();
    let rows = lead.iter().product::<usize>();
    let matrix = x
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((rows, width))?;
    Ok((matrix, lead))
}

/// Inverse of [`to_matrix`]: restores the leading dimensions around the matrix columns.
pub fn from_matrix(m: Array2<f64>, lead: &[usize]) -> Result<ArrayD<f64>> {
    let mut dims = lead.to_vec();
    dims.push(m.ncols());
    Ok(m.as_standard_layout()
        .into_owned()
        .into_shape_with_order(IxDyn(&dims))?)
}

/// Replaces the last dimension of `shape` with `width`.
pub fn with_last_dim(shape: &[usize], width: usize) -> Result<Vec<usize>> {
    if shape.is_empty() {
        return Err(NNError::ShapeMismatch(
            "expected an input shape of rank >= 1, got a scalar".to_string(),
        ));
    }
    let mut out = shape.to_vec();
    out[shape.len() - 1] = width;
    Ok(out)
}
