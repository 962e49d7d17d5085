use crate::Poi;

#[derive(Copy, Clone, Debug)]
pub struct LabelLayoutOptions {
	pub line_height_px: i32,
	pub margin_px: i32,
}

impl Default for LabelLayoutOptions {
	fn default() -> Self {
		Self {
			line_height_px: 12,
			margin_px: 2,
		}
	}
}

/// Greedy left-to-right label stagger: POIs whose crosshairs overlap
/// horizontally get their labels stacked vertically instead of drawn on top
/// of each other.
pub struct LabelLayout;

impl LabelLayout {
	/// Assigns `label_y` to every active POI in `pois`. Inactive POIs are
	/// left untouched. `text_width` measures the rendered width, in pixels,
	/// of a label string — an external collaborator (font metrics), not
	/// computed here.
	pub fn arrange(
		pois: &mut [Poi], viewport_height_px: u32, options: &LabelLayoutOptions, text_width: impl Fn(&str) -> i32,
	) {
		tracy::zone!("Label Layout");

		// Stable sort by draw_x ascending, inactive POIs sorted to the end;
		// ties keep their original (insertion) order because the sort is
		// stable and `active` is otherwise equal.
		let mut order: Vec<usize> = (0..pois.len()).collect();
		order.sort_by_key(|&idx| {
			let poi = &pois[idx];
			if poi.active {
				(0u8, poi.draw_x)
			} else {
				(1u8, i32::MAX)
			}
		});

		let mut overlap_group_right = i32::MIN;
		let mut current_y = 0i32;

		for idx in order {
			let width = {
				let poi = &pois[idx];
				if !poi.active {
					// Inactive POIs are sorted to the end; once we reach one,
					// every remaining one is also inactive.
					break;
				}
				text_width(&poi.name)
			};

			let poi = &mut pois[idx];
			let left = poi.draw_x;
			let right = poi.draw_x + width;

			let overflows = current_y + options.line_height_px + options.margin_px >= viewport_height_px as i32;
			if left > overlap_group_right || overflows {
				current_y = 0;
				overlap_group_right = right;
			} else if overlap_group_right < right {
				overlap_group_right = right;
			}

			current_y += options.line_height_px + options.margin_px;
			poi.label_y = current_y;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn active_poi(name: &str, draw_x: i32) -> Poi {
		let mut poi = Poi::new(name, 0.0, 0.0, 0.0);
		poi.active = true;
		poi.draw_x = draw_x;
		poi
	}

	#[test]
	fn three_poi_stagger_matches_expected_deltas() {
		let options = LabelLayoutOptions {
			line_height_px: 10,
			margin_px: 2,
		};
		let mut pois = vec![
			active_poi("a", 10),
			active_poi("bb", 15),
			active_poi("ccc", 200),
		];
		// "a" and "bb" overlap (widths chosen so right edges exceed the next
		// POI's draw_x); "ccc" starts its own group.
		LabelLayout::arrange(&mut pois, 1000, &options, |name| match name {
			"a" => 20,
			"bb" => 20,
			"ccc" => 30,
			_ => 0,
		});

		assert_eq!(pois[0].label_y, 12);
		assert_eq!(pois[1].label_y, 24);
		assert_eq!(pois[1].label_y - pois[0].label_y, options.line_height_px + options.margin_px);
		assert_eq!(pois[2].label_y, 12);
	}

	#[test]
	fn idempotent_across_repeated_runs() {
		let options = LabelLayoutOptions::default();
		let mut pois = vec![active_poi("a", 5), active_poi("b", 8), active_poi("c", 400)];
		LabelLayout::arrange(&mut pois, 1000, &options, |_| 15);
		let first: Vec<i32> = pois.iter().map(|p| p.label_y).collect();
		LabelLayout::arrange(&mut pois, 1000, &options, |_| 15);
		let second: Vec<i32> = pois.iter().map(|p| p.label_y).collect();
		assert_eq!(first, second);
	}

	#[test]
	fn inactive_pois_are_left_alone() {
		let options = LabelLayoutOptions::default();
		let mut pois = vec![active_poi("a", 5), Poi::new("inactive", 0.0, 0.0, 0.0)];
		LabelLayout::arrange(&mut pois, 1000, &options, |_| 15);
		assert_eq!(pois[1].label_y, -1);
	}
}
