mod test_blend_shape_basic;
mod test_mirror_basic;
